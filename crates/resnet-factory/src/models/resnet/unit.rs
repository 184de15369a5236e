//! # Residual Unit Wrapper
//!
//! [`ResidualUnitKind`] selects which unit a stage is built from;
//! [`UnitConfig`] and [`Unit`] wrap either kind behind [`UnitMeta`].

use crate::layers::padding::SamePad2d;
use crate::models::resnet::bottleneck_unit::{
    BottleneckResidualUnit, BottleneckResidualUnitConfig,
};
use crate::models::resnet::residual_unit::{ResidualUnit, ResidualUnitConfig};
use crate::models::resnet::shortcut;
use burn::prelude::{Backend, Config, Module, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common meta API of residual units and their configs.
pub trait UnitMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of filters of the inner convolutions.
    fn filters(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the first convolution.
    fn stride(&self) -> usize;

    /// Does the shortcut need a projection?
    fn needs_projection(&self) -> bool {
        shortcut::needs_projection(self.in_planes(), self.out_planes(), self.stride())
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
        SamePad2d::new([1, 1], [self.stride(), self.stride()]).output_resolution(input_resolution)
    }
}

/// The residual unit a stage is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResidualUnitKind {
    /// Two 3x3 convolutions; [`ResidualUnit`].
    #[default]
    Basic,

    /// 1x1, 3x3, 1x1 convolutions with 4x expansion; [`BottleneckResidualUnit`].
    Bottleneck,
}

impl ResidualUnitKind {
    /// Ratio of unit output planes to unit filters.
    pub fn expansion(&self) -> usize {
        match self {
            Self::Basic => 1,
            Self::Bottleneck => 4,
        }
    }

    /// Build a unit config of this kind.
    pub fn unit_config(
        &self,
        in_planes: usize,
        filters: usize,
        first_conv_strides: usize,
    ) -> UnitConfig {
        match self {
            Self::Basic => ResidualUnitConfig::new(in_planes, filters)
                .with_first_conv_strides(first_conv_strides)
                .into(),
            Self::Bottleneck => BottleneckResidualUnitConfig::new(in_planes, filters)
                .with_first_conv_strides(first_conv_strides)
                .with_expansion(self.expansion())
                .into(),
        }
    }
}

impl fmt::Display for ResidualUnitKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Bottleneck => write!(f, "bottleneck"),
        }
    }
}

impl FromStr for ResidualUnitKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "bottleneck" => Ok(Self::Bottleneck),
            _ => anyhow::bail!("unknown residual unit kind: {s:?} (expected basic|bottleneck)"),
        }
    }
}

/// [`Unit`] Config.
#[derive(Config, Debug)]
pub enum UnitConfig {
    /// A basic [`ResidualUnit`].
    Basic(ResidualUnitConfig),

    /// A [`BottleneckResidualUnit`].
    Bottleneck(BottleneckResidualUnitConfig),
}

impl From<ResidualUnitConfig> for UnitConfig {
    fn from(config: ResidualUnitConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckResidualUnitConfig> for UnitConfig {
    fn from(config: BottleneckResidualUnitConfig) -> Self {
        Self::Bottleneck(config)
    }
}

impl UnitMeta for UnitConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn filters(&self) -> usize {
        match self {
            Self::Basic(config) => config.filters(),
            Self::Bottleneck(config) => config.filters(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Bottleneck(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }
}

impl UnitConfig {
    /// The kind of the wrapped unit.
    pub fn kind(&self) -> ResidualUnitKind {
        match self {
            Self::Basic(_) => ResidualUnitKind::Basic,
            Self::Bottleneck(_) => ResidualUnitKind::Bottleneck,
        }
    }

    /// Initialize a [`Unit`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Unit<B> {
        match self {
            Self::Basic(config) => Unit::Basic(config.init(device)),
            Self::Bottleneck(config) => Unit::Bottleneck(config.init(device)),
        }
    }
}

/// A basic or bottleneck residual unit.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Unit<B: Backend> {
    /// A basic [`ResidualUnit`].
    Basic(ResidualUnit<B>),

    /// A [`BottleneckResidualUnit`].
    Bottleneck(BottleneckResidualUnit<B>),
}

impl<B: Backend> From<ResidualUnit<B>> for Unit<B> {
    fn from(unit: ResidualUnit<B>) -> Self {
        Self::Basic(unit)
    }
}

impl<B: Backend> From<BottleneckResidualUnit<B>> for Unit<B> {
    fn from(unit: BottleneckResidualUnit<B>) -> Self {
        Self::Bottleneck(unit)
    }
}

impl<B: Backend> UnitMeta for Unit<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(unit) => unit.in_planes(),
            Self::Bottleneck(unit) => unit.in_planes(),
        }
    }

    fn filters(&self) -> usize {
        match self {
            Self::Basic(unit) => unit.filters(),
            Self::Bottleneck(unit) => unit.filters(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(unit) => unit.out_planes(),
            Self::Bottleneck(unit) => unit.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(unit) => unit.stride(),
            Self::Bottleneck(unit) => unit.stride(),
        }
    }
}

impl<B: Backend> Unit<B> {
    /// Apply the wrapped unit to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, ceil(in_height / stride), ceil(in_width / stride)]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Basic(unit) => unit.forward(input),
            Self::Bottleneck(unit) => unit.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_unit_kind() {
        assert_eq!(ResidualUnitKind::default(), ResidualUnitKind::Basic);
        assert_eq!(ResidualUnitKind::Basic.expansion(), 1);
        assert_eq!(ResidualUnitKind::Bottleneck.expansion(), 4);

        assert_eq!(ResidualUnitKind::Bottleneck.to_string(), "bottleneck");
        assert_eq!(
            "Basic".parse::<ResidualUnitKind>().unwrap(),
            ResidualUnitKind::Basic
        );
        assert!("wide".parse::<ResidualUnitKind>().is_err());
    }

    #[test]
    fn test_unit_config() {
        let cfg = ResidualUnitKind::Basic.unit_config(16, 32, 2);
        assert!(matches!(cfg, UnitConfig::Basic(_)));
        assert_eq!(cfg.kind(), ResidualUnitKind::Basic);
        assert_eq!(cfg.in_planes(), 16);
        assert_eq!(cfg.filters(), 32);
        assert_eq!(cfg.out_planes(), 32);
        assert_eq!(cfg.stride(), 2);
        assert_eq!(cfg.output_resolution([20, 21]), [10, 11]);

        let cfg = ResidualUnitKind::Bottleneck.unit_config(64, 64, 1);
        assert!(matches!(cfg, UnitConfig::Bottleneck(_)));
        assert_eq!(cfg.kind(), ResidualUnitKind::Bottleneck);
        assert_eq!(cfg.filters(), 64);
        assert_eq!(cfg.out_planes(), 256);
        assert_eq!(cfg.stride(), 1);
        assert!(cfg.needs_projection());
    }

    #[test]
    fn test_unit_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let unit: Unit<B> = ResidualUnitKind::Bottleneck
            .unit_config(8, 2, 2)
            .init(&device);
        assert!(matches!(unit, Unit::Bottleneck(_)));
        assert_eq!(unit.in_planes(), 8);
        assert_eq!(unit.out_planes(), 8);
        assert!(unit.needs_projection());

        let input = Tensor::ones([2, 8, 6, 6], &device);
        let output = unit.forward(input.clone());
        assert_eq!(output.dims(), [2, 8, 3, 3]);

        let expected = match &unit {
            Unit::Bottleneck(inner) => inner.forward(input),
            _ => unreachable!(),
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
