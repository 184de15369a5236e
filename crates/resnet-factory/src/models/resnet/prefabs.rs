//! # Well-Known `ResNet` Configs
//!
//! [`PREFAB_RESNET_MAP`] names the original variants,
//! for ``[3, 224, 224]`` images and 1000 classes.

use crate::models::resnet::factory::ResnetFactory;
use crate::models::resnet::resnet_model::{ResNetContractConfig, ResNetStructureConfig};
use crate::prefabs::{PreFabConfig, StaticPreFabConfig, StaticPreFabMap};

/// `ImageNet` image ``[channels, height, width]``.
pub const IMAGENET_INPUT_SHAPE: [usize; 3] = [3, 224, 224];

/// `ImageNet` class count.
pub const IMAGENET_NUM_CLASSES: usize = 1000;

impl PreFabConfig<ResNetContractConfig> {
    /// Convert to a prefab for [`ResNetStructureConfig`].
    pub fn to_structure_prefab(&self) -> PreFabConfig<ResNetStructureConfig> {
        self.map_config(|config| config.to_structure())
    }
}

impl From<&StaticPreFabConfig<ResNetContractConfig>> for PreFabConfig<ResNetStructureConfig> {
    fn from(config: &StaticPreFabConfig<ResNetContractConfig>) -> Self {
        config.to_prefab().to_structure_prefab()
    }
}

impl From<&PreFabConfig<ResNetContractConfig>> for PreFabConfig<ResNetStructureConfig> {
    fn from(config: &PreFabConfig<ResNetContractConfig>) -> Self {
        config.to_structure_prefab()
    }
}

/// The original `ResNet` variants for `ImageNet`.
pub static PREFAB_RESNET_MAP: StaticPreFabMap<ResNetContractConfig> = StaticPreFabMap {
    name: "resnet",
    description: "Original ResNet configs",

    items: &[
        &StaticPreFabConfig {
            name: "resnet18",
            description: "ResNet-18 [2, 2, 2, 2] basic units",
            builder: || ResnetFactory::get_original_18(IMAGENET_INPUT_SHAPE, IMAGENET_NUM_CLASSES),
        },
        &StaticPreFabConfig {
            name: "resnet34",
            description: "ResNet-34 [3, 4, 6, 3] basic units",
            builder: || ResnetFactory::get_original_34(IMAGENET_INPUT_SHAPE, IMAGENET_NUM_CLASSES),
        },
        &StaticPreFabConfig {
            name: "resnet50",
            description: "ResNet-50 [3, 4, 6, 3] bottleneck units",
            builder: || ResnetFactory::get_original_50(IMAGENET_INPUT_SHAPE, IMAGENET_NUM_CLASSES),
        },
        &StaticPreFabConfig {
            name: "resnet101",
            description: "ResNet-101 [3, 4, 23, 3] bottleneck units",
            builder: || {
                ResnetFactory::get_original_101(IMAGENET_INPUT_SHAPE, IMAGENET_NUM_CLASSES)
            },
        },
        &StaticPreFabConfig {
            name: "resnet152",
            description: "ResNet-152 [3, 8, 36, 3] bottleneck units",
            builder: || {
                ResnetFactory::get_original_152(IMAGENET_INPUT_SHAPE, IMAGENET_NUM_CLASSES)
            },
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::unit::ResidualUnitKind;

    #[test]
    fn test_prefab_names() {
        assert_eq!(
            PREFAB_RESNET_MAP.names(),
            vec!["resnet18", "resnet34", "resnet50", "resnet101", "resnet152"]
        );
    }

    #[test]
    fn test_lookup() {
        let prefab = PREFAB_RESNET_MAP.try_lookup("resnet101").unwrap();
        let config = prefab.new_config();
        assert_eq!(config.unit_kind, ResidualUnitKind::Bottleneck);
        assert_eq!(config.units_per_block, vec![3, 4, 23, 3]);
        assert_eq!(config.input_shape, IMAGENET_INPUT_SHAPE);
        assert_eq!(config.num_classes, IMAGENET_NUM_CLASSES);

        assert!(PREFAB_RESNET_MAP.lookup("resnet200").is_none());
        let err = PREFAB_RESNET_MAP.try_lookup("resnet200").unwrap_err();
        assert_eq!(
            err.to_string(),
            "no resnet prefab named \"resnet200\"; known prefabs: \
             [\"resnet18\", \"resnet34\", \"resnet50\", \"resnet101\", \"resnet152\"]"
        );
    }

    #[test]
    #[should_panic(expected = "known prefabs")]
    fn test_expect_lookup_panics() {
        let _ = PREFAB_RESNET_MAP.expect_lookup("vgg16");
    }

    #[test]
    fn test_structure_prefab() {
        let prefab: PreFabConfig<ResNetStructureConfig> =
            PREFAB_RESNET_MAP.expect_lookup("resnet18").into();
        assert_eq!(prefab.name, "resnet18");

        let structure = prefab.new_config();
        assert_eq!(structure.blocks.len(), 4);
        assert_eq!(structure.head.in_planes, 512);

        let debug = format!("{prefab:?}");
        assert!(debug.contains("resnet18"));
    }
}
