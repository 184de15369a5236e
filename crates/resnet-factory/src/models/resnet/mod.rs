//! # `ResNet`
//!
//! The `ResNet` family of He et al., 2015, "Deep Residual Learning
//! for Image Recognition", with "same" padded convolutions.
//!
//! * [`ResnetFactory`] - the original 18/34/50/101/152 layer variants.
//! * [`ResNetContractConfig`] - depth/width description of a model.
//! * [`ResNetStructureConfig`] - the per-layer plan, and [`ResNet`] init.
//! * [`PREFAB_RESNET_MAP`] - named `ImageNet` configs.
//!
//! ```rust,ignore
//! let config = ResnetFactory::get_original_50([3, 224, 224], 1000);
//! let model: ResNet<B> = ResnetFactory::build(&config, &device)?;
//! let probs = model.forward(images);
//! ```

pub mod bottleneck_unit;
pub mod factory;
pub mod head;
pub mod prefabs;
pub mod residual_block;
pub mod residual_unit;
pub mod resnet_model;
pub mod shortcut;
pub mod stem;
pub mod unit;

pub use bottleneck_unit::{BottleneckResidualUnit, BottleneckResidualUnitConfig};
pub use factory::*;
pub use prefabs::*;
pub use residual_block::{ResidualBlock, ResidualBlockConfig, ResidualBlockMeta};
pub use residual_unit::{ResidualUnit, ResidualUnitConfig};
pub use resnet_model::*;
pub use unit::{ResidualUnitKind, Unit, UnitConfig, UnitMeta};
