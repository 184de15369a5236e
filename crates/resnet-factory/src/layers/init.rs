//! # Weight Initializers
//!
//! The Keras-style defaults used by the `ResNet` builders.

use burn::nn::Initializer;

/// Glorot (Xavier) normal; the convolution kernel initializer.
pub const GLOROT_NORMAL: Initializer = Initializer::XavierNormal { gain: 1.0 };

/// Glorot (Xavier) uniform; the dense layer initializer.
pub const GLOROT_UNIFORM: Initializer = Initializer::XavierUniform { gain: 1.0 };
