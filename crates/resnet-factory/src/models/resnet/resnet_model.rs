//! # `ResNet` Core Model
//!
//! [`ResNet`] is the core `ResNet` module.
//!
//! [`ResNetContractConfig`] implements [`Config`], and provides
//! a high-level configuration interface.
//! It provides [`ResNetContractConfig::try_to_structure`] to convert
//! to a [`ResNetStructureConfig`].
//!
//! [`ResNetStructureConfig`] implements [`Config`], and provides
//! [`ResNetStructureConfig::init`] to initialize a [`ResNet`].
//!
//! [`ResNet`] implements [`Module`], and provides
//! [`ResNet::forward`].

use crate::layers::blocks::conv_norm::BatchNormOptions;
use crate::models::resnet::head::{ClassifierHead, ClassifierHeadConfig};
use crate::models::resnet::residual_block::{
    ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
};
use crate::models::resnet::stem::{ResNetStem, ResNetStemConfig};
use crate::models::resnet::unit::{ResidualUnitKind, UnitConfig, UnitMeta};
use anyhow::{anyhow, bail};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Ignored;
use burn::prelude::{Backend, Config, Module, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level `ResNet` model configuration.
///
/// Block `i` has ``stem_filters * 2^i`` filters; every block after the
/// first halves the resolution in its first unit.
#[derive(Config, Debug)]
pub struct ResNetContractConfig {
    /// Image ``[channels, height, width]``.
    pub input_shape: [usize; 3],

    /// Number of classification classes.
    pub num_classes: usize,

    /// The residual unit every block is built from.
    pub unit_kind: ResidualUnitKind,

    /// Residual units per block.
    pub units_per_block: Vec<usize>,

    /// Filters of the stem convolution, and of the first block.
    #[config(default = 64)]
    pub stem_filters: usize,

    /// Square window of the head average pool.
    #[config(default = 7)]
    pub head_pool_size: usize,

    /// Kernel size of the expanding convolution of bottleneck units.
    #[config(default = 1)]
    pub bottleneck_last_kernel_size: usize,

    /// Batch norm options for every layer.
    #[config(default = "BatchNormOptions::new()")]
    pub norm: BatchNormOptions,
}

impl ResNetContractConfig {
    /// Check the contract parameters.
    ///
    /// Shape planning errors are reported by [`ResNetStructureConfig::try_validate`].
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if self.input_shape.contains(&0) {
            bail!("input_shape {:?} has a zero dimension", self.input_shape);
        }
        if self.num_classes == 0 {
            bail!("num_classes must be > 0");
        }
        if self.units_per_block.is_empty() {
            bail!("units_per_block is empty");
        }
        if let Some(idx) = self.units_per_block.iter().position(|&units| units == 0) {
            bail!("units_per_block[{idx}] is 0: {:?}", self.units_per_block);
        }
        if self.stem_filters == 0 {
            bail!("stem_filters must be > 0");
        }
        if self.bottleneck_last_kernel_size == 0 {
            bail!("bottleneck_last_kernel_size must be > 0");
        }
        Ok(())
    }

    /// The filters of each block.
    pub fn block_filters(&self) -> Vec<usize> {
        (0..self.units_per_block.len())
            .map(|idx| self.stem_filters << idx)
            .collect()
    }

    /// Derive the per-layer [`ResNetStructureConfig`].
    pub fn try_to_structure(&self) -> anyhow::Result<ResNetStructureConfig> {
        self.try_validate()?;

        let [channels, height, width] = self.input_shape;

        let stem = ResNetStemConfig::new(channels)
            .with_filters(self.stem_filters)
            .with_norm(self.norm.clone());

        let mut in_planes = stem.out_planes();
        let mut blocks = Vec::with_capacity(self.units_per_block.len());
        for (idx, (&units, filters)) in self
            .units_per_block
            .iter()
            .zip(self.block_filters())
            .enumerate()
        {
            let block =
                ResidualBlockConfig::build(units, in_planes, filters, self.unit_kind, idx == 0)
                    .map_units(&mut |_, unit| self.adapt_unit(unit));
            in_planes = block.out_planes();
            blocks.push(block);
        }

        let mut feature_resolution = stem.output_resolution([height, width]);
        for block in &blocks {
            feature_resolution = block.output_resolution(feature_resolution);
        }

        let head = ClassifierHeadConfig::new(in_planes, feature_resolution, self.num_classes)
            .with_pool_size(self.head_pool_size);

        let structure = ResNetStructureConfig::new(self.input_shape, stem, blocks, head);
        structure.try_validate()?;

        Ok(structure)
    }

    /// Derive the per-layer [`ResNetStructureConfig`].
    ///
    /// # Panics
    ///
    /// If [`Self::try_to_structure`] fails.
    pub fn to_structure(&self) -> ResNetStructureConfig {
        match self.try_to_structure() {
            Ok(structure) => structure,
            Err(err) => panic!("{err}\n{self:#?}"),
        }
    }

    fn adapt_unit(
        &self,
        unit: UnitConfig,
    ) -> UnitConfig {
        match unit {
            UnitConfig::Basic(config) => config.with_norm(self.norm.clone()).into(),
            UnitConfig::Bottleneck(config) => config
                .with_last_kernel_size(self.bottleneck_last_kernel_size)
                .with_norm(self.norm.clone())
                .into(),
        }
    }
}

impl From<ResNetContractConfig> for ResNetStructureConfig {
    fn from(config: ResNetContractConfig) -> Self {
        config.to_structure()
    }
}

/// One row of [`ResNetStructureConfig::layer_summary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    /// Layer path, e.g. ``block2.unit0``.
    pub name: String,

    /// Output channels (classes, for the classifier).
    pub out_channels: usize,

    /// Output ``[height, width]``.
    pub resolution: [usize; 2],
}

impl fmt::Display for LayerSummary {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let [height, width] = self.resolution;
        write!(
            f,
            "{:<16} {:>6} x {:>4} x {:<4}",
            self.name, self.out_channels, height, width
        )
    }
}

/// [`ResNet`] Structure Config.
///
/// An explicit per-layer plan; see [`ResNetContractConfig`] to derive one.
#[derive(Config, Debug)]
pub struct ResNetStructureConfig {
    /// Image ``[channels, height, width]``.
    pub input_shape: [usize; 3],

    /// The input stem.
    pub stem: ResNetStemConfig,

    /// The residual blocks.
    pub blocks: Vec<ResidualBlockConfig>,

    /// The classification head.
    pub head: ClassifierHeadConfig,
}

impl ResNetStructureConfig {
    /// The number of classes.
    pub fn num_classes(&self) -> usize {
        self.head.num_classes
    }

    /// The ``[height, width]`` of the feature map entering the head.
    pub fn feature_resolution(&self) -> [usize; 2] {
        let [_, height, width] = self.input_shape;
        self.blocks.iter().fold(
            self.stem.output_resolution([height, width]),
            |res, block| block.output_resolution(res),
        )
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        let [channels, _, _] = self.input_shape;
        if self.input_shape.contains(&0) {
            bail!("input_shape {:?} has a zero dimension", self.input_shape);
        }
        if self.stem.in_channels != channels {
            bail!(
                "stem.in_channels({}) != input channels({channels})",
                self.stem.in_channels
            );
        }
        let stem = &self.stem;
        if [stem.filters, stem.kernel_size, stem.stride, stem.pool_size, stem.pool_stride]
            .contains(&0)
        {
            bail!("stem has a zero size or stride: {stem:?}");
        }
        if self.blocks.is_empty() {
            bail!("blocks is empty");
        }

        let mut planes = self.stem.out_planes();
        for (idx, block) in self.blocks.iter().enumerate() {
            block
                .try_validate()
                .map_err(|err| anyhow!("blocks[{idx}]: {err}"))?;

            if block.in_planes() != planes {
                bail!(
                    "blocks[{idx}].in_planes({}) != previous out_planes({planes})",
                    block.in_planes()
                );
            }
            planes = block.out_planes();
        }

        if self.head.in_planes != planes {
            bail!(
                "head.in_planes({}) != blocks out_planes({planes})",
                self.head.in_planes
            );
        }

        let feature_resolution = self.feature_resolution();
        if self.head.feature_resolution != feature_resolution {
            bail!(
                "head.feature_resolution({:?}) != planned feature resolution({feature_resolution:?})",
                self.head.feature_resolution
            );
        }

        self.head.try_validate().map_err(|err| {
            anyhow!(
                "head: {err} (input_shape {:?} leaves {feature_resolution:?})",
                self.input_shape
            )
        })
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{err}\n{self:#?}");
        }
    }

    /// The output channels and resolution of every layer, in order.
    pub fn layer_summary(&self) -> Vec<LayerSummary> {
        let [_, height, width] = self.input_shape;
        let mut resolution = self.stem.output_resolution([height, width]);

        let mut rows = vec![LayerSummary {
            name: "stem".to_string(),
            out_channels: self.stem.out_planes(),
            resolution,
        }];

        for (block_idx, block) in self.blocks.iter().enumerate() {
            for (unit_idx, unit) in block.units.iter().enumerate() {
                resolution = unit.output_resolution(resolution);
                rows.push(LayerSummary {
                    name: format!("block{block_idx}.unit{unit_idx}"),
                    out_channels: unit.out_planes(),
                    resolution,
                });
            }
        }

        if let Some(pooled) = self.head.pooled_resolution() {
            rows.push(LayerSummary {
                name: "head.pool".to_string(),
                out_channels: self.head.in_planes,
                resolution: pooled,
            });
        }
        rows.push(LayerSummary {
            name: "head.fc".to_string(),
            out_channels: self.head.num_classes,
            resolution: [1, 1],
        });

        rows
    }

    /// Initialize a [`ResNet`] model.
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> anyhow::Result<ResNet<B>> {
        if let Err(err) = self.try_validate() {
            tracing::warn!(input_shape = ?self.input_shape, "invalid ResNet structure: {err}");
            return Err(err);
        }

        let model = ResNet {
            stem: self.stem.init(device),
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
            head: self.head.init(device),
            input_shape: Ignored(self.input_shape),
        };

        tracing::debug!(
            input_shape = ?self.input_shape,
            blocks = model.blocks.len(),
            num_classes = model.num_classes(),
            num_params = model.num_params(),
            "initialized ResNet"
        );

        Ok(model)
    }

    /// Initialize a [`ResNet`] model.
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResNet<B> {
        self.expect_valid();
        match self.try_init(device) {
            Ok(model) => model,
            Err(err) => panic!("{err}"),
        }
    }

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, ResidualBlockConfig) -> ResidualBlockConfig,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
            ..self
        }
    }
}

/// `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// The input stem.
    pub stem: ResNetStem<B>,

    /// The residual blocks.
    pub blocks: Vec<ResidualBlock<B>>,

    /// The classification head.
    pub head: ClassifierHead<B>,

    input_shape: Ignored<[usize; 3]>,
}

impl<B: Backend> ResNet<B> {
    /// The image ``[channels, height, width]`` the model was planned for.
    pub fn input_shape(&self) -> [usize; 3] {
        *self.input_shape
    }

    /// The number of classes.
    pub fn num_classes(&self) -> usize {
        self.head.num_classes()
    }

    /// Apply the stem and blocks.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, feature_height, feature_width]``
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [channels, height, width] = self.input_shape();
        let [batch] = unpack_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &["batch"],
            &[("channels", channels), ("height", height), ("width", width)],
        );

        let x = self.stem.forward(input);
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "planes", "feature_height", "feature_width"],
            &x,
            &[("batch", batch), ("planes", self.head.in_planes())],
        );

        x
    }

    /// Forward pass, returning pre-softmax class scores.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn forward_logits(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        self.head.forward_logits(self.forward_features(input))
    }

    /// Forward pass, returning class probabilities.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``; each row sums to 1.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        self.head.forward(self.forward_features(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;
    use hamcrest::prelude::*;

    fn tiny_contract() -> ResNetContractConfig {
        ResNetContractConfig::new([3, 32, 32], 10, ResidualUnitKind::Basic, vec![1, 1])
            .with_stem_filters(4)
            .with_head_pool_size(4)
    }

    #[test]
    fn test_contract_defaults() {
        let config =
            ResNetContractConfig::new([3, 224, 224], 1000, ResidualUnitKind::Basic, vec![2; 4]);
        assert_eq!(config.stem_filters, 64);
        assert_eq!(config.head_pool_size, 7);
        assert_eq!(config.bottleneck_last_kernel_size, 1);
        assert_eq!(config.block_filters(), vec![64, 128, 256, 512]);

        let structure = config.to_structure();
        assert_eq!(structure.feature_resolution(), [7, 7]);
        assert_eq!(structure.head.in_planes, 512);
        assert_eq!(structure.head.d_input(), Some(512));
        assert_eq!(structure.num_classes(), 1000);
    }

    #[test]
    fn test_contract_bottleneck_structure() {
        let structure = ResNetContractConfig::new(
            [3, 224, 224],
            1000,
            ResidualUnitKind::Bottleneck,
            vec![3, 4, 6, 3],
        )
        .with_bottleneck_last_kernel_size(3)
        .to_structure();

        assert_eq!(structure.blocks.len(), 4);
        assert_eq!(structure.head.in_planes, 2048);
        assert_eq!(structure.feature_resolution(), [7, 7]);

        let planes: Vec<usize> = structure.blocks.iter().map(|b| b.out_planes()).collect();
        assert_eq!(planes, vec![256, 512, 1024, 2048]);

        let strides: Vec<usize> = structure.blocks.iter().map(|b| b.stride()).collect();
        assert_eq!(strides, vec![1, 2, 2, 2]);

        for block in &structure.blocks {
            for unit in &block.units {
                match unit {
                    UnitConfig::Bottleneck(config) => assert_eq!(config.last_kernel_size, 3),
                    UnitConfig::Basic(_) => panic!("expected bottleneck units"),
                }
            }
        }
    }

    #[test]
    fn test_contract_errors() {
        let err = |config: ResNetContractConfig| config.try_to_structure().unwrap_err().to_string();

        assert_eq!(
            err(tiny_contract().with_num_classes(0)),
            "num_classes must be > 0"
        );
        assert_eq!(
            err(tiny_contract().with_units_per_block(vec![])),
            "units_per_block is empty"
        );
        assert_that!(
            err(tiny_contract().with_units_per_block(vec![1, 0])).starts_with("units_per_block[1]"),
            is(true)
        );

        let small = err(tiny_contract().with_input_shape([3, 8, 8]));
        assert_that!(small.contains("smaller than the 4x4 head pool"), is(true));
        assert_that!(small.contains("[3, 8, 8]"), is(true));
    }

    #[test]
    #[should_panic(expected = "units_per_block is empty")]
    fn test_to_structure_panics() {
        let _ = tiny_contract().with_units_per_block(vec![]).to_structure();
    }

    #[test]
    fn test_structure_validate_chaining() {
        let structure = tiny_contract().to_structure();
        structure.expect_valid();

        let broken = structure.clone().map_blocks(&mut |idx, block| {
            if idx == 1 {
                ResidualBlockConfig::build(1, 5, 8, ResidualUnitKind::Basic, false)
            } else {
                block
            }
        });
        assert_eq!(
            broken.try_validate().unwrap_err().to_string(),
            "blocks[1].in_planes(5) != previous out_planes(4)"
        );

        let mut wrong_head = structure.clone();
        wrong_head.head.in_planes = 3;
        assert_eq!(
            wrong_head.try_validate().unwrap_err().to_string(),
            "head.in_planes(3) != blocks out_planes(8)"
        );

        let mut no_blocks = structure;
        no_blocks.blocks.clear();
        assert_eq!(
            no_blocks.try_validate().unwrap_err().to_string(),
            "blocks is empty"
        );
    }

    #[test]
    fn test_layer_summary() {
        let structure = tiny_contract().to_structure();
        let rows = structure.layer_summary();

        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["stem", "block0.unit0", "block1.unit0", "head.pool", "head.fc"]
        );

        assert_eq!(rows[0].out_channels, 4);
        assert_eq!(rows[0].resolution, [8, 8]);
        assert_eq!(rows[2].out_channels, 8);
        assert_eq!(rows[2].resolution, [4, 4]);
        assert_eq!(rows[3].resolution, [1, 1]);
        assert_eq!(rows[4].out_channels, 10);
    }

    #[test]
    fn test_structure_config_save_load() {
        let structure = tiny_contract().to_structure();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resnet.json");
        structure.save(&path).unwrap();

        let loaded = ResNetStructureConfig::load(&path).unwrap();
        loaded.expect_valid();
        assert_eq!(loaded.input_shape, structure.input_shape);
        assert_eq!(loaded.layer_summary(), structure.layer_summary());
        assert_eq!(loaded.blocks.len(), 2);
    }

    #[test]
    fn test_resnet_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = tiny_contract().to_structure().init(&device);
        assert_eq!(model.input_shape(), [3, 32, 32]);
        assert_eq!(model.num_classes(), 10);
        assert_eq!(model.blocks.len(), 2);

        let input = Tensor::random([2, 3, 32, 32], Distribution::Normal(0.0, 1.0), &device);

        let features = model.forward_features(input.clone());
        assert_eq!(features.dims(), [2, 8, 4, 4]);

        let probs = model.forward(input.clone());
        assert_eq!(probs.dims(), [2, 10]);
        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        for sum in sums {
            assert_that!(sum as f64, close_to(1.0, 1e-5));
        }

        let logits = model.forward_logits(input);
        let expected = model.head.forward_logits(features);
        logits.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    #[should_panic]
    fn test_resnet_forward_wrong_resolution() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = tiny_contract().to_structure().init(&device);
        let _ = model.forward(Tensor::ones([1, 3, 64, 64], &device));
    }

    #[test]
    fn test_resnet_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new(
            [3, 16, 16],
            3,
            ResidualUnitKind::Bottleneck,
            vec![1, 1],
        )
        .with_stem_filters(2)
        .with_head_pool_size(2)
        .to_structure()
        .init(&device);

        let input = Tensor::random([2, 3, 16, 16], Distribution::Default, &device);
        let logits = model.forward_logits(input);
        assert_eq!(logits.dims(), [2, 3]);

        let grads = logits.sum().backward();
        assert!(model.head.fc.weight.grad(&grads).is_some());
        assert!(
            model.stem.cna.conv_norm.conv.weight.grad(&grads).is_some()
        );
    }
}
