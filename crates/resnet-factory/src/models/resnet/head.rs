//! # Classification Head
//!
//! ```text
//! relu -> avgpool(pool_size, /pool_stride, valid) -> flatten -> dense -> softmax
//! ```
//!
//! The dense layer is sized from the pooled feature map, so the head
//! is bound to the feature resolution it was planned for.

use crate::layers::init::GLOROT_UNIFORM;
use crate::layers::padding::valid_output_size;
use anyhow::bail;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::softmax;

/// [`ClassifierHead`] Config.
#[derive(Config, Debug)]
pub struct ClassifierHeadConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The ``[height, width]`` of the incoming feature map.
    pub feature_resolution: [usize; 2],

    /// The number of output classes.
    pub num_classes: usize,

    /// Square window of the average pool.
    #[config(default = 7)]
    pub pool_size: usize,

    /// Stride of the average pool.
    #[config(default = 1)]
    pub pool_stride: usize,

    /// Dense kernel initializer.
    #[config(default = "GLOROT_UNIFORM")]
    pub initializer: Initializer,
}

impl ClassifierHeadConfig {
    /// The ``[height, width]`` after pooling, if the window fits.
    pub fn pooled_resolution(&self) -> Option<[usize; 2]> {
        let [height, width] = self.feature_resolution;
        Some([
            valid_output_size(height, self.pool_size, self.pool_stride)?,
            valid_output_size(width, self.pool_size, self.pool_stride)?,
        ])
    }

    /// The width of the flattened features fed to the dense layer.
    pub fn d_input(&self) -> Option<usize> {
        let [height, width] = self.pooled_resolution()?;
        Some(self.in_planes * height * width)
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if self.num_classes == 0 {
            bail!("num_classes must be > 0");
        }
        if self.in_planes == 0 {
            bail!("in_planes must be > 0");
        }
        if self.pool_size == 0 || self.pool_stride == 0 {
            bail!(
                "pool_size({}) and pool_stride({}) must be > 0",
                self.pool_size,
                self.pool_stride,
            );
        }
        if self.pooled_resolution().is_none() {
            bail!(
                "feature resolution {:?} is smaller than the {}x{} head pool",
                self.feature_resolution,
                self.pool_size,
                self.pool_size,
            );
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{err}\n{self:#?}");
        }
    }

    /// Initialize a [`ClassifierHead`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ClassifierHead<B> {
        self.expect_valid();
        let d_input = self.in_planes * self.pooled_area();

        let mut fc: Linear<B> = LinearConfig::new(d_input, self.num_classes)
            .with_initializer(self.initializer.clone())
            .init(device);
        fc.bias = fc.bias.map(|bias| bias.map(|t| t.zeros_like()));

        ClassifierHead {
            act: Relu::new(),
            pool: AvgPool2dConfig::new([self.pool_size, self.pool_size])
                .with_strides([self.pool_stride, self.pool_stride])
                .with_padding(PaddingConfig2d::Valid)
                .init(),
            fc,
            in_planes: self.in_planes,
        }
    }

    fn pooled_area(&self) -> usize {
        self.pooled_resolution()
            .map(|[height, width]| height * width)
            .unwrap_or_default()
    }
}

/// `ResNet` classification head.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    /// Leading activation.
    pub act: Relu,

    /// Average pool.
    pub pool: AvgPool2d,

    /// Dense classifier.
    pub fc: Linear<B>,

    in_planes: usize,
}

impl<B: Backend> ClassifierHead<B> {
    /// The number of input feature planes.
    pub fn in_planes(&self) -> usize {
        self.in_planes
    }

    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }

    /// Forward pass, returning pre-softmax class scores.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``
    pub fn forward_logits(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_planes", "height", "width"],
            &input,
            &["batch"],
            &[("in_planes", self.in_planes)],
        );

        let x = self.act.forward(input);
        let x = self.pool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())],
        );

        x
    }

    /// Forward pass, returning class probabilities.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``; each row sums to 1.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        softmax(self.forward_logits(input), 1)
    }
}
