//! # "Same" Pooling

use crate::layers::padding::SamePad2d;
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`MaxPool2dSame`] Config.
#[derive(Config, Debug)]
pub struct MaxPool2dSameConfig {
    /// The ``[height, width]`` pooling window.
    pub kernel_size: [usize; 2],

    /// The ``[height, width]`` stride.
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],
}

impl MaxPool2dSameConfig {
    /// Initialize a [`MaxPool2dSame`].
    pub fn init(&self) -> MaxPool2dSame {
        MaxPool2dSame {
            pool: MaxPool2dConfig::new(self.kernel_size)
                .with_strides(self.stride)
                .with_padding(PaddingConfig2d::Valid)
                .init(),
        }
    }

    /// The ``[out_height, out_width]`` for an input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        SamePad2d::new(self.kernel_size, self.stride).output_resolution(input_resolution)
    }
}

/// Max pooling with TensorFlow-like 'SAME' padding.
///
/// The padding is filled with ``-inf``, so padded cells never win the max.
#[derive(Module, Clone, Debug)]
pub struct MaxPool2dSame {
    /// Unpadded pooling layer.
    pub pool: MaxPool2d,
}

impl MaxPool2dSame {
    /// The padding policy of this layer.
    pub fn same_pad(&self) -> SamePad2d {
        SamePad2d::new(self.pool.kernel_size, self.pool.stride)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, ceil(in_height / stride), ceil(in_width / stride)]``
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.same_pad().forward(input, f32::NEG_INFINITY);
        self.pool.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    #[test]
    fn test_max_pool_same_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = MaxPool2dSameConfig::new([3, 3]).with_stride([2, 2]);
        assert_eq!(config.output_resolution([112, 112]), [56, 56]);
        assert_eq!(config.output_resolution([7, 9]), [4, 5]);

        let pool = config.init();
        let input: Tensor<B, 4> = Tensor::ones([2, 3, 7, 9], &device);
        assert_eq!(pool.forward(input).dims(), [2, 3, 4, 5]);
    }

    #[test]
    fn test_max_pool_same_ignores_padding() {
        type B = NdArray<f32>;
        let device = Default::default();

        let pool = MaxPool2dSameConfig::new([3, 3]).with_stride([2, 2]).init();

        // All negative, so a zero pad would leak into the max.
        let input: Tensor<B, 4> = Tensor::from_data(
            [[[[-4.0f32, -3.0], [-2.0, -1.0]]]],
            &device,
        );
        let output = pool.forward(input);
        output
            .to_data()
            .assert_eq(&TensorData::from([[[[-1.0f32]]]]), true);
    }
}
