//! # "Same" Padding
//!
//! TensorFlow-like ``padding='same'`` support for burn layers.
//!
//! Burn pads symmetrically; "same" padding of a strided window is asymmetric,
//! with the odd pixel going to the bottom/right edge. [`SamePad2d`] pads the
//! input explicitly so that the wrapped layer can run with
//! ``PaddingConfig2d::Valid``.

use burn::prelude::{Backend, Tensor};

/// Output size of a "same" padded window.
///
/// ```text
/// out_size = ceil(size / stride)
/// ```
///
/// # Panics
///
/// If `size` or `stride` is zero.
pub fn same_output_size(
    size: usize,
    stride: usize,
) -> usize {
    assert!(size > 0, "size must be > 0");
    assert!(stride > 0, "stride must be > 0");
    size.div_ceil(stride)
}

/// Calculate asymmetric "same" padding along one axis.
///
/// ```text
/// total = max((ceil(size / stride) - 1) * stride + (kernel_size - 1) * dilation + 1 - size, 0)
/// ```
///
/// # Returns
///
/// ``(before, after)``, where ``after`` receives the odd pixel.
///
/// # Panics
///
/// If any argument is zero.
pub fn same_padding(
    size: usize,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
) -> (usize, usize) {
    assert!(kernel_size > 0, "kernel_size must be > 0");
    assert!(dilation > 0, "dilation must be > 0");
    let out_size = same_output_size(size, stride);

    let span = (out_size - 1) * stride + (kernel_size - 1) * dilation + 1;
    let total = span.saturating_sub(size);

    (total / 2, total - total / 2)
}

/// Predict the output size of an unpadded window.
///
/// ```text
/// out_size = floor((size - kernel_size) / stride) + 1
/// ```
///
/// # Returns
///
/// `None` if the window does not fit in `size`.
///
/// # Panics
///
/// If `stride` is zero.
pub fn valid_output_size(
    size: usize,
    kernel_size: usize,
    stride: usize,
) -> Option<usize> {
    assert!(stride > 0, "stride must be > 0");
    if kernel_size == 0 || size < kernel_size {
        return None;
    }
    Some((size - kernel_size) / stride + 1)
}

/// Padding policy for a 2d window with "same" semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamePad2d {
    /// ``[height, width]`` kernel size.
    pub kernel_size: [usize; 2],

    /// ``[height, width]`` stride.
    pub stride: [usize; 2],

    /// ``[height, width]`` dilation.
    pub dilation: [usize; 2],
}

impl SamePad2d {
    /// Create a policy with unit dilation.
    pub fn new(
        kernel_size: [usize; 2],
        stride: [usize; 2],
    ) -> Self {
        Self {
            kernel_size,
            stride,
            dilation: [1, 1],
        }
    }

    /// Set the dilation.
    pub fn with_dilation(
        self,
        dilation: [usize; 2],
    ) -> Self {
        Self { dilation, ..self }
    }

    /// The ``(left, right, top, bottom)`` padding for an input resolution.
    pub fn padding(
        &self,
        input_resolution: [usize; 2],
    ) -> (usize, usize, usize, usize) {
        let (top, bottom) = same_padding(
            input_resolution[0],
            self.kernel_size[0],
            self.stride[0],
            self.dilation[0],
        );
        let (left, right) = same_padding(
            input_resolution[1],
            self.kernel_size[1],
            self.stride[1],
            self.dilation[1],
        );
        (left, right, top, bottom)
    }

    /// The ``[out_height, out_width]`` of the padded window.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        [
            same_output_size(input_resolution[0], self.stride[0]),
            same_output_size(input_resolution[1], self.stride[1]),
        ]
    }

    /// Pad a ``[batch, channels, height, width]`` tensor.
    ///
    /// Returns the input untouched when no padding is needed.
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
        value: f32,
    ) -> Tensor<B, 4> {
        let [_, _, height, width] = input.dims();
        let padding = self.padding([height, width]);
        if padding == (0, 0, 0, 0) {
            return input;
        }
        input.pad(padding, value)
    }
}
