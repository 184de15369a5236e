#![warn(missing_docs)]
//!# resnet-factory - `ResNet` models for Burn
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::padding`] - TensorFlow style "same" padding.
//!   * [`layers::pool`] - "same" padded max pooling.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::conv_norm`] - ``Conv2d + BatchNorm2d`` block.
//!     * [`layers::blocks::cna`] - ``Conv2d + BatchNorm2d + ReLU`` block.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNet`, and [`models::resnet::ResnetFactory`].
//! * [`prefabs`] - named, well-known configs.
//! * [`utility`] - misc utilities.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod layers;
pub mod models;
pub mod prefabs;
pub mod utility;
