//! # `ResNet` Factory
//!
//! Builders for the `ResNet` variants of He et al., 2015.

use crate::models::resnet::resnet_model::{ResNet, ResNetContractConfig};
use crate::models::resnet::unit::ResidualUnitKind;
use anyhow::bail;
use burn::prelude::Backend;

/// ResNet-18 units per block.
pub const RESNET18_UNITS: [usize; 4] = [2, 2, 2, 2];
/// ResNet-34 units per block.
pub const RESNET34_UNITS: [usize; 4] = [3, 4, 6, 3];
/// ResNet-50 units per block.
pub const RESNET50_UNITS: [usize; 4] = [3, 4, 6, 3];
/// ResNet-101 units per block.
pub const RESNET101_UNITS: [usize; 4] = [3, 4, 23, 3];
/// ResNet-152 units per block.
pub const RESNET152_UNITS: [usize; 4] = [3, 8, 36, 3];

/// The depths [`ResnetFactory::get_original_depth`] knows.
pub const KNOWN_DEPTHS: [usize; 5] = [18, 34, 50, 101, 152];

/// Factory for the original `ResNet` variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResnetFactory;

impl ResnetFactory {
    /// A `ResNet` built from `unit_kind` units.
    ///
    /// # Arguments
    ///
    /// - `input_shape`: image ``[channels, height, width]``.
    /// - `num_classes`: the number of output classes.
    /// - `unit_kind`: the residual unit of every block.
    /// - `units_per_block`: units in each block; block `i` has ``64 * 2^i`` filters.
    pub fn get_original(
        input_shape: [usize; 3],
        num_classes: usize,
        unit_kind: ResidualUnitKind,
        units_per_block: &[usize],
    ) -> ResNetContractConfig {
        ResNetContractConfig::new(
            input_shape,
            num_classes,
            unit_kind,
            units_per_block.to_vec(),
        )
    }

    /// ResNet-18: basic units, ``[2, 2, 2, 2]``.
    pub fn get_original_18(
        input_shape: [usize; 3],
        num_classes: usize,
    ) -> ResNetContractConfig {
        Self::get_original(
            input_shape,
            num_classes,
            ResidualUnitKind::Basic,
            &RESNET18_UNITS,
        )
    }

    /// ResNet-34: basic units, ``[3, 4, 6, 3]``.
    pub fn get_original_34(
        input_shape: [usize; 3],
        num_classes: usize,
    ) -> ResNetContractConfig {
        Self::get_original(
            input_shape,
            num_classes,
            ResidualUnitKind::Basic,
            &RESNET34_UNITS,
        )
    }

    /// ResNet-50: bottleneck units, ``[3, 4, 6, 3]``.
    pub fn get_original_50(
        input_shape: [usize; 3],
        num_classes: usize,
    ) -> ResNetContractConfig {
        Self::get_original(
            input_shape,
            num_classes,
            ResidualUnitKind::Bottleneck,
            &RESNET50_UNITS,
        )
    }

    /// ResNet-101: bottleneck units, ``[3, 4, 23, 3]``.
    pub fn get_original_101(
        input_shape: [usize; 3],
        num_classes: usize,
    ) -> ResNetContractConfig {
        Self::get_original(
            input_shape,
            num_classes,
            ResidualUnitKind::Bottleneck,
            &RESNET101_UNITS,
        )
    }

    /// ResNet-152: bottleneck units, ``[3, 8, 36, 3]``.
    pub fn get_original_152(
        input_shape: [usize; 3],
        num_classes: usize,
    ) -> ResNetContractConfig {
        Self::get_original(
            input_shape,
            num_classes,
            ResidualUnitKind::Bottleneck,
            &RESNET152_UNITS,
        )
    }

    /// Select a variant by depth; see [`KNOWN_DEPTHS`].
    pub fn get_original_depth(
        depth: usize,
        input_shape: [usize; 3],
        num_classes: usize,
    ) -> anyhow::Result<ResNetContractConfig> {
        Ok(match depth {
            18 => Self::get_original_18(input_shape, num_classes),
            34 => Self::get_original_34(input_shape, num_classes),
            50 => Self::get_original_50(input_shape, num_classes),
            101 => Self::get_original_101(input_shape, num_classes),
            152 => Self::get_original_152(input_shape, num_classes),
            _ => bail!("no ResNet-{depth}; known depths: {KNOWN_DEPTHS:?}"),
        })
    }

    /// Plan and initialize a model from a contract.
    pub fn build<B: Backend>(
        config: &ResNetContractConfig,
        device: &B::Device,
    ) -> anyhow::Result<ResNet<B>> {
        tracing::debug!(
            unit_kind = %config.unit_kind,
            units_per_block = ?config.units_per_block,
            input_shape = ?config.input_shape,
            num_classes = config.num_classes,
            "building ResNet"
        );

        let structure = config.try_to_structure().inspect_err(|err| {
            tracing::warn!("cannot plan ResNet: {err}");
        })?;
        structure.try_init(device)
    }

    /// Plan and initialize a model by depth; see [`Self::get_original_depth`].
    pub fn build_depth<B: Backend>(
        depth: usize,
        input_shape: [usize; 3],
        num_classes: usize,
        device: &B::Device,
    ) -> anyhow::Result<ResNet<B>> {
        let config = Self::get_original_depth(depth, input_shape, num_classes)?;
        Self::build(&config, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::residual_block::ResidualBlockMeta;
    use crate::models::resnet::unit::UnitMeta;
    use burn::backend::NdArray;

    const IMAGENET: [usize; 3] = [3, 224, 224];

    fn total_units(config: &ResNetContractConfig) -> usize {
        config.units_per_block.iter().sum()
    }

    #[test]
    fn test_original_variants() {
        let cases = [
            (
                ResnetFactory::get_original_18(IMAGENET, 1000),
                ResidualUnitKind::Basic,
                RESNET18_UNITS,
                512,
            ),
            (
                ResnetFactory::get_original_34(IMAGENET, 1000),
                ResidualUnitKind::Basic,
                RESNET34_UNITS,
                512,
            ),
            (
                ResnetFactory::get_original_50(IMAGENET, 1000),
                ResidualUnitKind::Bottleneck,
                RESNET50_UNITS,
                2048,
            ),
            (
                ResnetFactory::get_original_101(IMAGENET, 1000),
                ResidualUnitKind::Bottleneck,
                RESNET101_UNITS,
                2048,
            ),
            (
                ResnetFactory::get_original_152(IMAGENET, 1000),
                ResidualUnitKind::Bottleneck,
                RESNET152_UNITS,
                2048,
            ),
        ];

        for (config, kind, units, head_planes) in cases {
            assert_eq!(config.unit_kind, kind);
            assert_eq!(config.units_per_block, units.to_vec());
            assert_eq!(config.input_shape, IMAGENET);
            assert_eq!(config.num_classes, 1000);

            let structure = config.to_structure();
            assert_eq!(structure.head.in_planes, head_planes);
            assert_eq!(structure.feature_resolution(), [7, 7]);
            assert_eq!(structure.head.d_input(), Some(head_planes));
        }
    }

    #[test]
    fn test_layer_depths() {
        // conv layers in the units, plus the stem conv and the classifier.
        for depth in KNOWN_DEPTHS {
            let config = ResnetFactory::get_original_depth(depth, IMAGENET, 1000).unwrap();
            let convs_per_unit = match config.unit_kind {
                ResidualUnitKind::Basic => 2,
                ResidualUnitKind::Bottleneck => 3,
            };
            assert_eq!(total_units(&config) * convs_per_unit + 2, depth);
        }
    }

    #[test]
    fn test_first_units() {
        let structure = ResnetFactory::get_original_50(IMAGENET, 1000).to_structure();

        let first = &structure.blocks[0].units[0];
        assert_eq!(first.stride(), 1);
        assert_eq!(first.in_planes(), 64);
        assert_eq!(first.out_planes(), 256);
        assert!(first.needs_projection());

        for block in &structure.blocks[1..] {
            assert_eq!(block.units[0].stride(), 2);
            assert!(block.units[0].needs_projection());
            assert!(block.units[1..].iter().all(|u| !u.needs_projection()));
        }

        let structure = ResnetFactory::get_original_18(IMAGENET, 1000).to_structure();
        assert!(!structure.blocks[0].units[0].needs_projection());
        assert_eq!(structure.blocks[0].stride(), 1);
    }

    #[test]
    fn test_unknown_depth() {
        let err = ResnetFactory::get_original_depth(20, IMAGENET, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no ResNet-20; known depths: [18, 34, 50, 101, 152]"
        );
    }

    #[test]
    fn test_build_small() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = ResnetFactory::get_original(
            [1, 16, 16],
            4,
            ResidualUnitKind::Basic,
            &[1, 1],
        )
        .with_stem_filters(2)
        .with_head_pool_size(2);

        let model: ResNet<B> = ResnetFactory::build(&config, &device).unwrap();
        assert_eq!(model.num_classes(), 4);
        assert_eq!(model.input_shape(), [1, 16, 16]);

        let err = ResnetFactory::build::<B>(&config.with_input_shape([1, 4, 4]), &device)
            .err()
            .unwrap();
        assert!(err.to_string().contains("head pool"));
    }
}
