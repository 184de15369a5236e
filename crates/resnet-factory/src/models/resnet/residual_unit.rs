//! # Basic Residual Unit for `ResNet`
//!
//! [`ResidualUnit`] is the two-convolution unit of `ResNet-18` and `ResNet-34`.
//!
//! [`ResidualUnitConfig`] implements [`Config`], and provides
//! [`ResidualUnitConfig::init`] to initialize a [`ResidualUnit`].
//!
//! Both implement [`UnitMeta`].

use crate::layers::blocks::cna::{ConvNormAct2d, ConvNormAct2dConfig};
use crate::layers::blocks::conv_norm::{BatchNormOptions, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::layers::init::GLOROT_NORMAL;
use crate::models::resnet::shortcut::{ProjectionShortcut, ProjectionShortcutConfig};
use crate::models::resnet::unit::UnitMeta;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ResidualUnit`] Config.
///
/// Implements [`UnitMeta`].
#[derive(Config, Debug)]
pub struct ResidualUnitConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Filters of both convolutions; also the out channels.
    pub filters: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub first_conv_strides: usize,

    /// Convolution kernel initializer.
    #[config(default = "GLOROT_NORMAL")]
    pub initializer: Initializer,

    /// Batch norm options.
    #[config(default = "BatchNormOptions::new()")]
    pub norm: BatchNormOptions,
}

impl UnitMeta for ResidualUnitConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn out_planes(&self) -> usize {
        self.filters
    }

    fn stride(&self) -> usize {
        self.first_conv_strides
    }
}

impl ResidualUnitConfig {
    fn conv_norm(
        &self,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
    ) -> ConvNorm2dConfig {
        ConvNorm2dConfig::new(in_channels, out_channels, 3)
            .with_stride(stride)
            .with_initializer(self.initializer.clone())
            .with_norm(self.norm.clone())
    }

    /// Initialize a [`ResidualUnit`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualUnit<B> {
        let shortcut = if self.needs_projection() {
            ProjectionShortcutConfig::new(self.in_planes(), self.out_planes())
                .with_stride(self.stride())
                .with_initializer(self.initializer.clone())
                .with_norm(self.norm.clone())
                .init(device)
                .into()
        } else {
            None
        };

        let cna1: ConvNormAct2dConfig = self
            .conv_norm(self.in_planes, self.filters, self.first_conv_strides)
            .into();
        let cna2: ConvNormAct2dConfig = self.conv_norm(self.filters, self.filters, 1).into();

        ResidualUnit {
            shortcut,
            cna1: cna1.init(device),
            cna2: cna2.init(device),
        }
    }
}

/// Basic Residual Unit for `ResNet`.
///
/// ```text
/// x -> conv3x3/stride -> bn -> relu -> conv3x3 -> bn -> (+ shortcut(x)) -> relu
/// ```
///
/// Implements [`UnitMeta`].
#[derive(Module, Debug)]
pub struct ResidualUnit<B: Backend> {
    /// Optional projection; identity when `None`.
    pub shortcut: Option<ProjectionShortcut<B>>,

    /// First Conv/Norm/Act Block.
    pub cna1: ConvNormAct2d<B>,

    /// Second Conv/Norm/Act Block; the shortcut merges before its activation.
    pub cna2: ConvNormAct2d<B>,
}

impl<B: Backend> UnitMeta for ResidualUnit<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn filters(&self) -> usize {
        self.cna1.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.cna2.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()
    }
}

impl<B: Backend> ResidualUnit<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, filters, ceil(in_height / stride), ceil(in_width / stride)]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let identity = match &self.shortcut {
            Some(shortcut) => shortcut.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.cna1.forward(input);
        let x = self.cna2.hook_forward(x, |x| x + identity);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
