//! # Projection Shortcut
//!
//! When a residual unit changes the shape of its input, the identity path
//! can no longer be added to the residual. [`ProjectionShortcut`] maps the
//! input onto the residual's shape with a 1x1 conv (sharing the unit's first
//! stride) followed by batch norm.

use crate::layers::blocks::conv_norm::{
    BatchNormOptions, ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta,
};
use crate::layers::init::GLOROT_NORMAL;
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Does a residual unit need a projection on its shortcut?
///
/// The identity shortcut only matches when neither the channel count
/// nor the resolution changes.
pub fn needs_projection(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> bool {
    stride != 1 || in_planes != out_planes
}

/// [`ProjectionShortcut`] Meta trait.
pub trait ProjectionShortcutMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the projection.
    fn stride(&self) -> usize;
}

/// [`ProjectionShortcut`] configuration.
#[derive(Config, Debug)]
pub struct ProjectionShortcutConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the projection.
    #[config(default = 1)]
    pub stride: usize,

    /// Convolution kernel initializer.
    #[config(default = "GLOROT_NORMAL")]
    pub initializer: Initializer,

    /// Batch norm options.
    #[config(default = "BatchNormOptions::new()")]
    pub norm: BatchNormOptions,
}

impl ProjectionShortcutMeta for ProjectionShortcutConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ProjectionShortcutConfig {
    /// The embedded conv/norm config.
    pub fn conv_norm_config(&self) -> ConvNorm2dConfig {
        ConvNorm2dConfig::new(self.in_planes, self.out_planes, 1)
            .with_stride(self.stride)
            .with_initializer(self.initializer.clone())
            .with_norm(self.norm.clone())
    }

    /// Initialize a [`ProjectionShortcut`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ProjectionShortcut<B> {
        ProjectionShortcut {
            conv_norm: self.conv_norm_config().init(device),
        }
    }
}

/// 1x1 conv/norm projection for the residual shortcut.
///
/// Maps ``[batch, in_planes, in_height, in_width]`` to
/// ``[batch, out_planes, ceil(in_height / stride), ceil(in_width / stride)]``.
#[derive(Module, Debug)]
pub struct ProjectionShortcut<B: Backend> {
    /// Embedded conv/norm.
    pub conv_norm: ConvNorm2d<B>,
}

impl<B: Backend> ProjectionShortcutMeta for ProjectionShortcut<B> {
    fn in_planes(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_planes(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()
    }
}

impl<B: Backend> ProjectionShortcut<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.conv_norm.forward(input)
    }
}
