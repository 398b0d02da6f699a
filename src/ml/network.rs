//! Network assembly and the forward pass.
//!
//! A network is an ordered stack of layers ending in a dense softmax
//! layer. Convolutional layers, when present, sit at the front and read
//! the flat input batch reshaped to `[batch, channels, height, width]`.
//! Dropout runs on the input of every dense layer, the flattening step
//! included, and is active only on an autodiff backend so evaluation
//! sees the full signal.
//!
//! The forward pass keeps every layer input it produced. Those signals,
//! with the final logit and output appended, are the inspection surface
//! for pruning experiments.

use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::pool::MaxPool2dConfig;
use burn::nn::DropoutConfig;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::error::{ModelError, ModelResult};
use crate::domain::network::{Activation, LayerKind};
use crate::ml::init::{constant_bias, truncated_normal, BIAS_VALUE, WEIGHT_STD};
use crate::ml::layer::{ConvLayer, DenseLayer, Layer};
use crate::ml::regularizer::ResolvedPenalty;

/// How a flat input row maps back onto an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

/// A value flowing between layers: flat `[batch, features]` rows or a
/// spatial `[batch, channels, height, width]` block.
#[derive(Debug, Clone)]
pub enum Signal<B: Backend> {
    Flat(Tensor<B, 2>),
    Spatial(Tensor<B, 4>),
}

impl<B: Backend> Signal<B> {
    pub fn into_data(self) -> TensorData {
        match self {
            Signal::Flat(tensor) => tensor.into_data(),
            Signal::Spatial(tensor) => tensor.into_data(),
        }
    }

    /// Flat view, flattening spatial blocks to one row per sample.
    fn flat(self) -> Tensor<B, 2> {
        match self {
            Signal::Flat(tensor) => tensor,
            Signal::Spatial(tensor) => tensor.flatten(1, 3),
        }
    }

    fn spatial(self) -> Tensor<B, 4> {
        match self {
            Signal::Spatial(tensor) => tensor,
            // The builder only accepts convolutions ahead of every dense
            // layer and demands an image shape for them.
            Signal::Flat(_) => unreachable!("convolutional layers always receive spatial input"),
        }
    }
}

/// Everything one forward pass produced.
#[derive(Debug)]
pub struct ForwardPass<B: Backend> {
    /// The input each layer consumed, in layer order. Dense entries are
    /// recorded after dropout, so they are the exact matmul operands.
    pub signals: Vec<Signal<B>>,
    /// Pre-softmax scores of the final layer.
    pub logit: Tensor<B, 2>,
    /// Output of the final layer.
    pub output: Tensor<B, 2>,
}

impl<B: Backend> ForwardPass<B> {
    /// Layer inputs followed by the logit and the output, detached into
    /// plain data.
    pub fn into_signal_data(self) -> Vec<TensorData> {
        let mut data: Vec<TensorData> = self.signals.into_iter().map(Signal::into_data).collect();
        data.push(self.logit.into_data());
        data.push(self.output.into_data());
        data
    }
}

/// A feed forward classifier ending in a softmax layer.
#[derive(Module, Debug)]
pub struct SoftmaxNetwork<B: Backend> {
    pub layers: Vec<Layer<B>>,
    pub image_shape: Ignored<Option<ImageShape>>,
}

impl<B: Backend> SoftmaxNetwork<B> {
    /// Run the full stack. `keep_prob` is the probability a dense input
    /// entry survives dropout; pass `1.0` to disable it.
    pub fn forward(&self, input: Tensor<B, 2>, keep_prob: f64) -> ForwardPass<B> {
        let dropout = DropoutConfig::new(1.0 - keep_prob).init();
        let mut signal = match self.image_shape.0 {
            Some(shape) => {
                let [batch, _] = input.dims();
                Signal::Spatial(input.reshape([batch, shape.channels, shape.height, shape.width]))
            }
            None => Signal::Flat(input),
        };
        let mut signals = Vec::with_capacity(self.layers.len());
        let mut logit = None;

        for layer in &self.layers {
            signal = match layer {
                Layer::Conv(conv) => {
                    let spatial = signal.spatial();
                    signals.push(Signal::Spatial(spatial.clone()));
                    Signal::Spatial(conv.forward(spatial))
                }
                Layer::Dense(dense) => {
                    let flat = dropout.forward(signal.flat());
                    signals.push(Signal::Flat(flat.clone()));
                    let (pre_activation, output) = dense.forward(flat);
                    logit = Some(pre_activation);
                    Signal::Flat(output)
                }
            };
        }

        let output = signal.flat();
        let logit = match logit {
            Some(logit) => logit,
            // The builder rejects stacks that do not end in a dense layer.
            None => unreachable!("networks always end with a dense layer"),
        };
        ForwardPass {
            signals,
            logit,
            output,
        }
    }

    /// Multiply every mask back into its stored parameter. Parameter ids
    /// are preserved, so optimizer state keeps following each tensor.
    pub fn reapply_masks(mut self) -> Self {
        self.layers = self.layers.into_iter().map(Layer::reapply_masks).collect();
        self
    }

    pub fn layer_kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(Layer::kind).collect()
    }

    /// Stored weight values per layer, unmasked.
    pub fn weights(&self) -> Vec<TensorData> {
        self.layers.iter().map(Layer::weight_data).collect()
    }

    /// Stored bias values per layer, unmasked.
    pub fn biases(&self) -> Vec<TensorData> {
        self.layers.iter().map(Layer::bias_data).collect()
    }

    /// The weight penalty under the given resolved coefficients, or
    /// `None` when every coefficient is zero.
    pub fn penalty_term(&self, penalty: &ResolvedPenalty) -> Option<Tensor<B, 1>> {
        let mut terms = Vec::new();
        for (index, layer) in self.layers.iter().enumerate() {
            if penalty.l1[index] != 0.0 {
                terms.push(layer.weight_l1().mul_scalar(penalty.l1[index]));
            }
            if penalty.l2[index] != 0.0 {
                terms.push(layer.weight_l2().mul_scalar(penalty.l2[index]));
            }
        }
        terms.into_iter().reduce(|sum, term| sum + term)
    }
}

enum PendingLayer<B: Backend> {
    Dense {
        weight: Tensor<B, 2>,
        bias: Tensor<B, 1>,
        weight_mask: Option<Tensor<B, 2>>,
        bias_mask: Option<Tensor<B, 1>>,
    },
    Conv {
        weight: Tensor<B, 4>,
        bias: Tensor<B, 1>,
        weight_mask: Option<Tensor<B, 4>>,
        bias_mask: Option<Tensor<B, 1>>,
        pooled: bool,
    },
}

/// Collects layers in order, then validates the stack and assigns
/// activations: relu everywhere except the final layer, which gets
/// softmax.
pub struct NetworkBuilder<B: Backend> {
    pending: Vec<PendingLayer<B>>,
    image_shape: Option<ImageShape>,
}

impl<B: Backend> Default for NetworkBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> NetworkBuilder<B> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            image_shape: None,
        }
    }

    /// Declare how flat input rows reshape into images. Required before
    /// any convolutional layer.
    pub fn image_input(mut self, channels: usize, height: usize, width: usize) -> Self {
        self.image_shape = Some(ImageShape {
            channels,
            height,
            width,
        });
        self
    }

    /// A dense layer. `weight` is `[input_width, output_width]`.
    pub fn dense(mut self, weight: Tensor<B, 2>, bias: Tensor<B, 1>) -> Self {
        self.pending.push(PendingLayer::Dense {
            weight,
            bias,
            weight_mask: None,
            bias_mask: None,
        });
        self
    }

    /// A dense layer with pruning masks over both parameters.
    pub fn masked_dense(
        mut self,
        weight: Tensor<B, 2>,
        bias: Tensor<B, 1>,
        weight_mask: Tensor<B, 2>,
        bias_mask: Tensor<B, 1>,
    ) -> Self {
        self.pending.push(PendingLayer::Dense {
            weight,
            bias,
            weight_mask: Some(weight_mask),
            bias_mask: Some(bias_mask),
        });
        self
    }

    /// A convolutional layer followed by 2x2 max pooling. `weight` is
    /// `[channels_out, channels_in, k, k]`.
    pub fn conv(mut self, weight: Tensor<B, 4>, bias: Tensor<B, 1>) -> Self {
        self.pending.push(PendingLayer::Conv {
            weight,
            bias,
            weight_mask: None,
            bias_mask: None,
            pooled: true,
        });
        self
    }

    /// A convolutional layer without the pooling step.
    pub fn conv_unpooled(mut self, weight: Tensor<B, 4>, bias: Tensor<B, 1>) -> Self {
        self.pending.push(PendingLayer::Conv {
            weight,
            bias,
            weight_mask: None,
            bias_mask: None,
            pooled: false,
        });
        self
    }

    /// A pooled convolutional layer with pruning masks.
    pub fn masked_conv(
        mut self,
        weight: Tensor<B, 4>,
        bias: Tensor<B, 1>,
        weight_mask: Tensor<B, 4>,
        bias_mask: Tensor<B, 1>,
    ) -> Self {
        self.pending.push(PendingLayer::Conv {
            weight,
            bias,
            weight_mask: Some(weight_mask),
            bias_mask: Some(bias_mask),
            pooled: true,
        });
        self
    }

    pub fn finish(self) -> ModelResult<SoftmaxNetwork<B>> {
        if self.pending.is_empty() {
            return Err(ModelError::InvalidConfig(
                "a network needs at least one layer".into(),
            ));
        }
        if matches!(self.pending.last(), Some(PendingLayer::Conv { .. })) {
            return Err(ModelError::InvalidConfig(
                "the final layer must be dense so the network can emit class scores".into(),
            ));
        }

        let mut seen_dense = false;
        for pending in &self.pending {
            match pending {
                PendingLayer::Dense { weight, bias, weight_mask, bias_mask } => {
                    seen_dense = true;
                    Self::check_mask_shapes(
                        weight.dims(),
                        bias.dims(),
                        weight_mask.as_ref().map(Tensor::dims),
                        bias_mask.as_ref().map(Tensor::dims),
                    )?;
                }
                PendingLayer::Conv { weight, bias, weight_mask, bias_mask, .. } => {
                    if seen_dense {
                        return Err(ModelError::InvalidConfig(
                            "convolutional layers must come before all dense layers".into(),
                        ));
                    }
                    if self.image_shape.is_none() {
                        return Err(ModelError::InvalidConfig(
                            "convolutional layers need an image input shape; call image_input first"
                                .into(),
                        ));
                    }
                    Self::check_mask_shapes(
                        weight.dims(),
                        bias.dims(),
                        weight_mask.as_ref().map(Tensor::dims),
                        bias_mask.as_ref().map(Tensor::dims),
                    )?;
                }
            }
        }

        let last = self.pending.len() - 1;
        let layers = self
            .pending
            .into_iter()
            .enumerate()
            .map(|(index, pending)| {
                let activation = if index == last {
                    Activation::Softmax
                } else {
                    Activation::Relu
                };
                match pending {
                    PendingLayer::Dense { weight, bias, weight_mask, bias_mask } => {
                        Layer::Dense(match (weight_mask, bias_mask) {
                            (Some(weight_mask), Some(bias_mask)) => DenseLayer::masked(
                                weight,
                                bias,
                                weight_mask,
                                bias_mask,
                                activation,
                            ),
                            _ => DenseLayer::new(weight, bias, activation),
                        })
                    }
                    PendingLayer::Conv { weight, bias, weight_mask, bias_mask, pooled } => {
                        let pool = pooled
                            .then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init());
                        Layer::Conv(match (weight_mask, bias_mask) {
                            (Some(weight_mask), Some(bias_mask)) => ConvLayer::masked(
                                weight,
                                bias,
                                weight_mask,
                                bias_mask,
                                pool,
                                activation,
                            ),
                            _ => ConvLayer::new(weight, bias, pool, activation),
                        })
                    }
                }
            })
            .collect();

        Ok(SoftmaxNetwork {
            layers,
            image_shape: Ignored(self.image_shape),
        })
    }

    fn check_mask_shapes<const D: usize>(
        weight: [usize; D],
        bias: [usize; 1],
        weight_mask: Option<[usize; D]>,
        bias_mask: Option<[usize; 1]>,
    ) -> ModelResult<()> {
        if let Some(mask) = weight_mask {
            if mask != weight {
                return Err(ModelError::InvalidConfig(format!(
                    "weight mask shape {mask:?} does not match weight shape {weight:?}"
                )));
            }
        }
        if let Some(mask) = bias_mask {
            if mask != bias {
                return Err(ModelError::InvalidConfig(format!(
                    "bias mask shape {mask:?} does not match bias shape {bias:?}"
                )));
            }
        }
        Ok(())
    }
}

/// The convolutional preset: two pooled 5x5 convolutions into two dense
/// layers, sized for 28x28 grayscale digits by default.
#[derive(Config, Debug)]
pub struct LenetConfig {
    #[config(default = 32)]
    pub conv1_channels: usize,
    #[config(default = 64)]
    pub conv2_channels: usize,
    #[config(default = 5)]
    pub kernel_size: usize,
    #[config(default = 512)]
    pub hidden_width: usize,
    #[config(default = 10)]
    pub classes: usize,
    #[config(default = 28)]
    pub image_side: usize,
    #[config(default = 42)]
    pub seed: u64,
}

impl LenetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<SoftmaxNetwork<B>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let k = self.kernel_size;
        // Two 2x2 poolings divide each spatial side by four.
        let pooled_side = self.image_side / 4;
        let flat_width = pooled_side * pooled_side * self.conv2_channels;

        let conv1_weight =
            truncated_normal::<B, 4>([self.conv1_channels, 1, k, k], WEIGHT_STD, device, &mut rng);
        let conv2_weight = truncated_normal::<B, 4>(
            [self.conv2_channels, self.conv1_channels, k, k],
            WEIGHT_STD,
            device,
            &mut rng,
        );
        let fc1_weight =
            truncated_normal::<B, 2>([flat_width, self.hidden_width], WEIGHT_STD, device, &mut rng);
        let fc2_weight =
            truncated_normal::<B, 2>([self.hidden_width, self.classes], WEIGHT_STD, device, &mut rng);

        NetworkBuilder::new()
            .image_input(1, self.image_side, self.image_side)
            .conv(conv1_weight, constant_bias([self.conv1_channels], BIAS_VALUE, device))
            .conv(conv2_weight, constant_bias([self.conv2_channels], BIAS_VALUE, device))
            .dense(fc1_weight, constant_bias([self.hidden_width], BIAS_VALUE, device))
            .dense(fc2_weight, constant_bias([self.classes], BIAS_VALUE, device))
            .finish()
    }
}

/// The fully connected preset, 784-300-100-10 by default.
#[derive(Config, Debug)]
pub struct DenseNetConfig {
    #[config(default = "vec![784, 300, 100, 10]")]
    pub widths: Vec<usize>,
    #[config(default = 42)]
    pub seed: u64,
}

impl DenseNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<SoftmaxNetwork<B>> {
        if self.widths.len() < 2 {
            return Err(ModelError::InvalidConfig(format!(
                "a dense network needs at least two layer widths, got {:?}",
                self.widths
            )));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut builder = NetworkBuilder::new();
        for pair in self.widths.windows(2) {
            let weight = truncated_normal::<B, 2>([pair[0], pair[1]], WEIGHT_STD, device, &mut rng);
            builder = builder.dense(weight, constant_bias([pair[1]], BIAS_VALUE, device));
        }
        builder.finish()
    }
}
