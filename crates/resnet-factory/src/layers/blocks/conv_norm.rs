//! # `ConvNorm` Module
//!
//! A [`ConvNorm2d`] module is a "same" padded [`Conv2d`] layer
//! followed by a [`BatchNorm`] layer over the channel axis.

use crate::layers::init::GLOROT_NORMAL;
use crate::layers::padding::SamePad2d;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// Batch normalization options, independent of the feature count.
///
/// Defaults follow Keras ``BatchNormalization``;
/// `momentum` is burn's convention: the weight of the new batch statistic,
/// so Keras' ``momentum=0.99`` is ``0.01`` here.
#[derive(Config, Debug, PartialEq)]
pub struct BatchNormOptions {
    /// Variance epsilon.
    #[config(default = 1e-3)]
    pub epsilon: f64,

    /// Running statistics update rate.
    #[config(default = 0.01)]
    pub momentum: f64,
}

impl Default for BatchNormOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchNormOptions {
    /// Build a [`BatchNormConfig`] for `num_features` channels.
    pub fn to_config(
        &self,
        num_features: usize,
    ) -> BatchNormConfig {
        BatchNormConfig::new(num_features)
            .with_epsilon(self.epsilon)
            .with_momentum(self.momentum)
    }
}

/// [`ConvNorm2d`] Meta.
pub trait ConvNorm2dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Square kernel size.
    fn kernel_size(&self) -> usize;

    /// Square stride.
    fn stride(&self) -> usize;

    /// The "same" padding policy.
    fn same_pad(&self) -> SamePad2d {
        SamePad2d::new(
            [self.kernel_size(), self.kernel_size()],
            [self.stride(), self.stride()],
        )
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// # Returns
    ///
    /// ``[ceil(in_height / stride), ceil(in_width / stride)]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.same_pad().output_resolution(input_resolution)
    }
}

/// [`ConvNorm2d`] Config.
#[derive(Config, Debug)]
pub struct ConvNorm2dConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels (filters).
    pub out_channels: usize,

    /// Square kernel size.
    pub kernel_size: usize,

    /// Square stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Use a convolution bias.
    #[config(default = true)]
    pub bias: bool,

    /// Convolution kernel initializer.
    #[config(default = "GLOROT_NORMAL")]
    pub initializer: Initializer,

    /// Batch norm options.
    #[config(default = "BatchNormOptions::new()")]
    pub norm: BatchNormOptions,
}

impl ConvNorm2dMeta for ConvNorm2dConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ConvNorm2dConfig {
    /// The wrapped [`Conv2dConfig`].
    ///
    /// Padding is `Valid`; [`ConvNorm2d::forward`] pads the input itself.
    pub fn conv_config(&self) -> Conv2dConfig {
        Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Valid)
        .with_bias(self.bias)
        .with_initializer(self.initializer.clone())
    }

    /// Initialize a [`ConvNorm2d`].
    ///
    /// The kernel uses `initializer`; the bias starts at zero.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNorm2d<B> {
        let mut conv: Conv2d<B> = self.conv_config().init(device);
        conv.bias = conv.bias.map(|bias| bias.map(|t| t.zeros_like()));

        ConvNorm2d {
            conv,
            norm: self.norm.to_config(self.out_channels).init(device),
        }
    }
}

/// "Same" padded [`Conv2d`] and [`BatchNorm`] layer.
///
/// Implements [`ConvNorm2dMeta`].
#[derive(Module, Debug)]
pub struct ConvNorm2d<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvNorm2dMeta for ConvNorm2d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.dims()[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.dims()[0]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

impl<B: Backend> ConvNorm2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, ceil(in_height / stride), ceil(in_width / stride)]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.same_pad().forward(input, 0.0);
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_norm_options() {
        let options = BatchNormOptions::default();
        assert_eq!(options.epsilon, 1e-3);
        assert_eq!(options.momentum, 0.01);

        let config = options.with_epsilon(1e-5).to_config(12);
        assert_eq!(config.num_features, 12);
        assert_eq!(config.epsilon, 1e-5);
        assert_eq!(config.momentum, 0.01);
    }

    #[test]
    fn test_conv_norm_config() {
        let config = ConvNorm2dConfig::new(2, 4, 3).with_stride(2);
        assert_eq!(config.in_channels(), 2);
        assert_eq!(config.out_channels(), 4);
        assert_eq!(config.kernel_size(), 3);
        assert_eq!(config.stride(), 2);
        assert!(config.bias);
        assert!(matches!(
            config.initializer,
            Initializer::XavierNormal { gain } if gain == 1.0
        ));
        assert_eq!(config.output_resolution([9, 8]), [5, 4]);

        let conv = config.conv_config();
        assert_eq!(conv.channels, [2, 4]);
        assert_eq!(conv.kernel_size, [3, 3]);
        assert_eq!(conv.stride, [2, 2]);
        assert!(matches!(conv.padding, PaddingConfig2d::Valid));
    }

    #[test]
    fn test_conv_norm_meta() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: ConvNorm2d<B> = ConvNorm2dConfig::new(3, 5, 1).with_stride(2).init(&device);
        assert_eq!(layer.in_channels(), 3);
        assert_eq!(layer.out_channels(), 5);
        assert_eq!(layer.kernel_size(), 1);
        assert_eq!(layer.stride(), 2);
        let bias = layer.conv.bias.as_ref().expect("bias");
        assert_eq!(bias.val().abs().sum().into_scalar(), 0.0);
        assert_eq!(layer.norm.epsilon, 1e-3);
    }

    #[test]
    fn test_conv_norm_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: ConvNorm2d<B> = ConvNorm2dConfig::new(2, 4, 3).with_stride(2).init(&device);

        let input = Tensor::ones([2, 2, 9, 8], &device);
        let output = layer.forward(input.clone());

        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_channels", 4),
                ("out_height", 5),
                ("out_width", 4)
            ],
        );

        let expected = {
            let x = layer.same_pad().forward(input, 0.0);
            let x = layer.conv.forward(x);
            layer.norm.forward(x)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
