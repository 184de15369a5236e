//! # `ConvNormAct2d` - conv/norm/activation block.
//!
//! A [`ConvNormAct2d`] module is:
//! * a "same" padded [`burn::nn::conv::Conv2d`] layer,
//! * a [`burn::nn::BatchNorm`] layer,
//! * a [`Relu`] activation.
//!
//! With support for hooking the forward method,
//! to run code between the norm and activation layers.

use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use burn::config::Config;
use burn::module::Module;
use burn::nn::Relu;
use burn::prelude::{Backend, Tensor};

/// [`ConvNormAct2d`] Config.
#[derive(Config, Debug)]
pub struct ConvNormAct2dConfig {
    /// The conv/norm config.
    pub conv_norm: ConvNorm2dConfig,
}

impl From<ConvNorm2dConfig> for ConvNormAct2dConfig {
    fn from(conv_norm: ConvNorm2dConfig) -> Self {
        Self { conv_norm }
    }
}

impl ConvNorm2dMeta for ConvNormAct2dConfig {
    fn in_channels(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn kernel_size(&self) -> usize {
        self.conv_norm.kernel_size()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()
    }
}

impl ConvNormAct2dConfig {
    /// Initialize a [`ConvNormAct2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNormAct2d<B> {
        ConvNormAct2d {
            conv_norm: self.conv_norm.init(device),
            act: Relu::new(),
        }
    }
}

/// Sequenced conv/norm/relu block.
///
/// Implements [`ConvNorm2dMeta`].
#[derive(Module, Debug)]
pub struct ConvNormAct2d<B: Backend> {
    /// Conv/Norm layers.
    pub conv_norm: ConvNorm2d<B>,

    /// Activation layer.
    pub act: Relu,
}

impl<B: Backend> ConvNorm2dMeta for ConvNormAct2d<B> {
    fn in_channels(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn kernel_size(&self) -> usize {
        self.conv_norm.kernel_size()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()
    }
}

impl<B: Backend> ConvNormAct2d<B> {
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
        self.hook_forward(input, |x| x)
    }

    /// Hooked Forward Pass.
    ///
    /// Applies the hook after normalization but before activation:
    ///
    /// ```rust,ignore
    /// let x = self.conv_norm.forward(input);
    /// let x = hook(x);
    /// self.act.forward(x)
    /// ```
    ///
    /// The hook must preserve the shape.
    pub fn hook_forward<F>(
        &self,
        input: Tensor<B, 4>,
        hook: F,
    ) -> Tensor<B, 4>
    where
        F: FnOnce(Tensor<B, 4>) -> Tensor<B, 4>,
    {
        let x = self.conv_norm.forward(input);
        let x = hook(x);
        self.act.forward(x)
    }
}
