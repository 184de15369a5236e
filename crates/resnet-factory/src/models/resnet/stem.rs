//! # Input Stem
//!
//! The `ResNet` stem:
//!
//! ```text
//! conv7x7, 64, /2 -> bn -> relu -> maxpool3x3, /2
//! ```
//!
//! Every window uses "same" padding, so a ``224x224`` input
//! leaves the stem at ``56x56``.

use crate::layers::blocks::cna::{ConvNormAct2d, ConvNormAct2dConfig};
use crate::layers::blocks::conv_norm::{BatchNormOptions, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::layers::init::GLOROT_NORMAL;
use crate::layers::pool::{MaxPool2dSame, MaxPool2dSameConfig};
use bimm_contracts::assert_shape_contract_periodically;
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ResNetStem`] Config.
#[derive(Config, Debug)]
pub struct ResNetStemConfig {
    /// Image channels.
    pub in_channels: usize,

    /// Filters of the stem convolution.
    #[config(default = 64)]
    pub filters: usize,

    /// Square kernel of the stem convolution.
    #[config(default = 7)]
    pub kernel_size: usize,

    /// Stride of the stem convolution.
    #[config(default = 2)]
    pub stride: usize,

    /// Square window of the stem pool.
    #[config(default = 3)]
    pub pool_size: usize,

    /// Stride of the stem pool.
    #[config(default = 2)]
    pub pool_stride: usize,

    /// Convolution kernel initializer.
    #[config(default = "GLOROT_NORMAL")]
    pub initializer: Initializer,

    /// Batch norm options.
    #[config(default = "BatchNormOptions::new()")]
    pub norm: BatchNormOptions,
}

impl ResNetStemConfig {
    /// The stem conv/norm/act config.
    pub fn cna_config(&self) -> ConvNormAct2dConfig {
        ConvNorm2dConfig::new(self.in_channels, self.filters, self.kernel_size)
            .with_stride(self.stride)
            .with_initializer(self.initializer.clone())
            .with_norm(self.norm.clone())
            .into()
    }

    /// The stem pool config.
    pub fn pool_config(&self) -> MaxPool2dSameConfig {
        MaxPool2dSameConfig::new([self.pool_size, self.pool_size])
            .with_stride([self.pool_stride, self.pool_stride])
    }

    /// The number of output planes.
    pub fn out_planes(&self) -> usize {
        self.filters
    }

    /// Get the resolution after the convolution.
    pub fn conv_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.cna_config().output_resolution(input_resolution)
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.pool_config()
            .output_resolution(self.conv_resolution(input_resolution))
    }

    /// Initialize a [`ResNetStem`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNetStem<B> {
        ResNetStem {
            cna: self.cna_config().init(device),
            pool: self.pool_config().init(),
        }
    }
}

/// `ResNet` stem module.
#[derive(Module, Debug)]
pub struct ResNetStem<B: Backend> {
    /// Stem conv/norm/act.
    pub cna: ConvNormAct2d<B>,

    /// Stem pool.
    pub pool: MaxPool2dSame,
}

impl<B: Backend> ResNetStem<B> {
    /// The number of image channels.
    pub fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    /// The number of output planes.
    pub fn out_planes(&self) -> usize {
        self.cna.out_channels()
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.pool
            .same_pad()
            .output_resolution(self.cna.output_resolution(input_resolution))
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        assert_shape_contract_periodically!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &[("in_channels", self.in_channels())],
        );

        let x = self.cna.forward(input);
        self.pool.forward(x)
    }
}
