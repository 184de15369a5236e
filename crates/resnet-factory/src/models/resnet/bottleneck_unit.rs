//! # Bottleneck Residual Unit for `ResNet`
//!
//! [`BottleneckResidualUnit`] is the three-convolution unit of
//! `ResNet-50`, `ResNet-101` and `ResNet-152`.
//!
//! The first 1x1 conv reduces the planes to `filters` (and carries the stride),
//! the 3x3 conv works at the reduced width, and the last conv
//! expands to ``filters * expansion`` planes.

use crate::layers::blocks::cna::{ConvNormAct2d, ConvNormAct2dConfig};
use crate::layers::blocks::conv_norm::{BatchNormOptions, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::layers::init::GLOROT_NORMAL;
use crate::models::resnet::shortcut::{ProjectionShortcut, ProjectionShortcutConfig};
use crate::models::resnet::unit::UnitMeta;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BottleneckResidualUnit`] Config.
///
/// Implements [`UnitMeta`].
#[derive(Config, Debug)]
pub struct BottleneckResidualUnitConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Filters of the reducing convolutions.
    pub filters: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub first_conv_strides: usize,

    /// Control factor for `out_planes()`.
    #[config(default = 4)]
    pub expansion: usize,

    /// Kernel size of the expanding convolution.
    ///
    /// `1` per the `ResNet` paper; `3` gives the wider variant.
    #[config(default = 1)]
    pub last_kernel_size: usize,

    /// Convolution kernel initializer.
    #[config(default = "GLOROT_NORMAL")]
    pub initializer: Initializer,

    /// Batch norm options.
    #[config(default = "BatchNormOptions::new()")]
    pub norm: BatchNormOptions,
}

impl UnitMeta for BottleneckResidualUnitConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn out_planes(&self) -> usize {
        self.filters * self.expansion
    }

    fn stride(&self) -> usize {
        self.first_conv_strides
    }
}

impl BottleneckResidualUnitConfig {
    fn conv_norm(
        &self,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
    ) -> ConvNorm2dConfig {
        ConvNorm2dConfig::new(in_channels, out_channels, kernel_size)
            .with_initializer(self.initializer.clone())
            .with_norm(self.norm.clone())
    }

    /// Initialize a [`BottleneckResidualUnit`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> BottleneckResidualUnit<B> {
        let in_planes = self.in_planes();
        let filters = self.filters();
        let out_planes = self.out_planes();

        let shortcut = if self.needs_projection() {
            ProjectionShortcutConfig::new(in_planes, out_planes)
                .with_stride(self.stride())
                .with_initializer(self.initializer.clone())
                .with_norm(self.norm.clone())
                .init(device)
                .into()
        } else {
            None
        };

        let cna1: ConvNormAct2dConfig = self
            .conv_norm(in_planes, filters, 1)
            .with_stride(self.stride())
            .into();
        let cna2: ConvNormAct2dConfig = self.conv_norm(filters, filters, 3).into();
        let cna3: ConvNormAct2dConfig = self
            .conv_norm(filters, out_planes, self.last_kernel_size)
            .into();

        BottleneckResidualUnit {
            shortcut,
            cna1: cna1.init(device),
            cna2: cna2.init(device),
            cna3: cna3.init(device),
        }
    }
}

/// Bottleneck Residual Unit for `ResNet`.
///
/// ```text
/// x -> conv1x1/stride -> bn -> relu
///   -> conv3x3 -> bn -> relu
///   -> conv1x1 (x expansion) -> bn -> (+ shortcut(x)) -> relu
/// ```
///
/// Implements [`UnitMeta`].
#[derive(Module, Debug)]
pub struct BottleneckResidualUnit<B: Backend> {
    /// Optional projection; identity when `None`.
    pub shortcut: Option<ProjectionShortcut<B>>,

    /// Reducing Conv/Norm/Act Block.
    pub cna1: ConvNormAct2d<B>,

    /// Spatial Conv/Norm/Act Block.
    pub cna2: ConvNormAct2d<B>,

    /// Expanding Conv/Norm/Act Block; the shortcut merges before its activation.
    pub cna3: ConvNormAct2d<B>,
}

impl<B: Backend> UnitMeta for BottleneckResidualUnit<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn filters(&self) -> usize {
        self.cna1.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.cna3.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()
    }
}

impl<B: Backend> BottleneckResidualUnit<B> {
    /// The expansion factor, ``out_planes / filters``.
    pub fn expansion(&self) -> usize {
        self.out_planes() / self.filters()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, filters * expansion, ceil(in_height / stride), ceil(in_width / stride)]`` tensor.
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

        assert_shape_contract_periodically!(
            ["batch", "filters", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("filters", self.filters()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        let x = self.cna2.forward(x);
        let x = self.cna3.hook_forward(x, |x| x + identity);

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
