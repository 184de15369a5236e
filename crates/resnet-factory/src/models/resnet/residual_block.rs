//! # `ResNet` Residual Block (Stage)
//!
//! A [`ResidualBlock`] is a sequence of residual [`Unit`]s sharing
//! the same filter count.
//!
//! [`ResidualBlockMeta`] defines a common meta API for [`ResidualBlock`]
//! and [`ResidualBlockConfig`].
//!
//! [`ResidualBlockConfig`] implements [`Config`], and provides
//! [`ResidualBlockConfig::init`] to initialize a [`ResidualBlock`].
//!
//! [`ResidualBlock`] implements [`Module`], and provides
//! [`ResidualBlock::forward`].

use crate::models::resnet::unit::{ResidualUnitKind, Unit, UnitConfig, UnitMeta};
use anyhow::bail;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of units.
    fn len(&self) -> usize;

    /// Check if the block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The effective stride of the block.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2];
}

/// [`ResidualBlock`] Configuration.
#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    /// The component units.
    pub units: Vec<UnitConfig>,
}

impl From<Vec<UnitConfig>> for ResidualBlockConfig {
    fn from(units: Vec<UnitConfig>) -> Self {
        Self { units }
    }
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn len(&self) -> usize {
        self.units.len()
    }

    fn in_planes(&self) -> usize {
        self.units[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.units[self.units.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.units.iter().map(|unit| unit.stride()).product()
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.units
            .iter()
            .fold(input_resolution, |res, unit| unit.output_resolution(res))
    }
}

impl ResidualBlockConfig {
    /// Build a stage of `units` residual units of one kind.
    ///
    /// The first unit downsamples with stride 2, unless this is the
    /// first block of the network; every other unit has stride 1.
    ///
    /// # Arguments
    ///
    /// - `units`: the number of residual units.
    /// - `in_planes`: the input planes of the first unit.
    /// - `filters`: the filters of every unit.
    /// - `kind`: the residual unit kind.
    /// - `is_first_block`: suppress the downsampling stride.
    pub fn build(
        units: usize,
        in_planes: usize,
        filters: usize,
        kind: ResidualUnitKind,
        is_first_block: bool,
    ) -> Self {
        let mut planes = in_planes;
        let units = (0..units)
            .map(|idx| {
                let stride = if idx == 0 && !is_first_block { 2 } else { 1 };
                let unit = kind.unit_config(planes, filters, stride);
                planes = unit.out_planes();
                unit
            })
            .collect();

        Self { units }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if self.is_empty() {
            bail!("units is empty");
        }

        for (idx, unit) in self.units.iter().enumerate() {
            if unit.filters() == 0 || unit.stride() == 0 {
                bail!(
                    "unit[{idx}] has filters({}) and stride({}); both must be > 0",
                    unit.filters(),
                    unit.stride(),
                );
            }
        }

        for idx in 1..self.units.len() {
            let prev = &self.units[idx - 1];
            let curr = &self.units[idx];
            if prev.out_planes() != curr.in_planes() {
                bail!(
                    "unit[{}].out_planes({}) != unit[{}].in_planes({})",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                );
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{err}\n{self:#?}");
        }
    }

    /// Initialize a new [`ResidualBlock`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        self.expect_valid();

        ResidualBlock {
            units: self.units.iter().map(|unit| unit.init(device)).collect(),
        }
    }

    /// Apply a mapping over the units.
    pub fn map_units<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, UnitConfig) -> UnitConfig,
    {
        Self {
            units: self
                .units
                .into_iter()
                .enumerate()
                .map(|(idx, unit)| f(idx, unit))
                .collect(),
        }
    }
}

/// A `ResNet` stage.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    /// Internal units.
    pub units: Vec<Unit<B>>,
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn len(&self) -> usize {
        self.units.len()
    }

    fn in_planes(&self) -> usize {
        self.units[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.units[self.units.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.units.iter().map(|unit| unit.stride()).product()
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.units
            .iter()
            .fold(input_resolution, |res, unit| unit.output_resolution(res))
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Apply the units in sequence.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, out_height, out_width]``; see
    /// [`ResidualBlockMeta::output_resolution`].
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

        let x = self.units.iter().fold(input, |x, unit| unit.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::residual_unit::ResidualUnitConfig;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_residual_block_build_basic() {
        let config = ResidualBlockConfig::build(2, 64, 128, ResidualUnitKind::Basic, false);
        config.expect_valid();
        assert_eq!(config.len(), 2);
        assert_eq!(config.in_planes(), 64);
        assert_eq!(config.out_planes(), 128);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([56, 56]), [28, 28]);

        let unit1 = &config.units[0];
        assert_eq!(unit1.in_planes(), 64);
        assert_eq!(unit1.out_planes(), 128);
        assert_eq!(unit1.stride(), 2);

        let unit2 = &config.units[1];
        assert_eq!(unit2.in_planes(), 128);
        assert_eq!(unit2.out_planes(), 128);
        assert_eq!(unit2.stride(), 1);
    }

    #[test]
    fn test_residual_block_build_first_bottleneck() {
        let config = ResidualBlockConfig::build(3, 64, 64, ResidualUnitKind::Bottleneck, true);
        config.expect_valid();
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 64);
        assert_eq!(config.out_planes(), 256);
        assert_eq!(config.stride(), 1);

        assert!(config.units.iter().all(|u| u.stride() == 1));
        assert_eq!(config.units[0].in_planes(), 64);
        assert!(config.units[0].needs_projection());
        assert_eq!(config.units[1].in_planes(), 256);
        assert!(!config.units[1].needs_projection());
    }

    #[test]
    fn test_residual_block_validate() {
        let empty = ResidualBlockConfig::new(vec![]);
        assert_eq!(
            empty.try_validate().unwrap_err().to_string(),
            "units is empty"
        );

        let broken = ResidualBlockConfig::from(vec![
            ResidualUnitConfig::new(4, 8).into(),
            ResidualUnitConfig::new(16, 16).into(),
        ]);
        assert_eq!(
            broken.try_validate().unwrap_err().to_string(),
            "unit[0].out_planes(8) != unit[1].in_planes(16)"
        );

        let zero = ResidualBlockConfig::from(vec![ResidualUnitConfig::new(4, 0).into()]);
        assert!(zero.try_validate().is_err());
    }

    #[test]
    #[should_panic(expected = "units is empty")]
    fn test_residual_block_init_invalid() {
        type B = NdArray<f32>;
        let device = Default::default();
        let _block: ResidualBlock<B> = ResidualBlockConfig::new(vec![]).init(&device);
    }

    #[test]
    fn test_residual_block_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = ResidualBlockConfig::build(2, 4, 8, ResidualUnitKind::Basic, false);
        let block: ResidualBlock<B> = config.init(&device);

        assert_eq!(block.len(), 2);
        assert_eq!(block.in_planes(), 4);
        assert_eq!(block.out_planes(), 8);
        assert_eq!(block.stride(), 2);
        assert_eq!(block.output_resolution([7, 10]), [4, 5]);

        let input = Tensor::ones([2, 4, 7, 10], &device);
        let output = block.forward(input.clone());

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 8),
                ("out_height", 4),
                ("out_width", 5)
            ],
        );

        let mut expected = input;
        for unit in block.units.iter() {
            expected = unit.forward(expected);
        }
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
