//! The two layer families and their pruning masks.
//!
//! A layer owns its trainable weight and bias as `Param` tensors. Masks
//! are plain tensor fields: Burn treats a bare tensor inside a module as
//! a constant, so masks receive no gradients and no optimizer updates,
//! which is exactly the contract a pruning mask needs. A mask multiplies
//! into its parameter every time the layer computes, silencing the
//! zeroed entries in the value used, not in the stored parameter.

use burn::module::{Ignored, Module, Param};
use burn::nn::pool::MaxPool2d;
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Tensor, TensorData};

use crate::domain::network::{Activation, LayerKind};

/// A fully connected layer computing `activation(input . weight + bias)`.
///
/// `weight` is `[input_width, output_width]`, `bias` is `[output_width]`.
/// Masks, when present, share the shape of the tensor they silence.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    pub weight: Param<Tensor<B, 2>>,
    pub bias: Param<Tensor<B, 1>>,
    pub weight_mask: Option<Tensor<B, 2>>,
    pub bias_mask: Option<Tensor<B, 1>>,
    pub activation: Ignored<Activation>,
}

impl<B: Backend> DenseLayer<B> {
    pub fn new(weight: Tensor<B, 2>, bias: Tensor<B, 1>, activation: Activation) -> Self {
        Self {
            weight: Param::from_tensor(weight),
            bias: Param::from_tensor(bias),
            weight_mask: None,
            bias_mask: None,
            activation: Ignored(activation),
        }
    }

    pub fn masked(
        weight: Tensor<B, 2>,
        bias: Tensor<B, 1>,
        weight_mask: Tensor<B, 2>,
        bias_mask: Tensor<B, 1>,
        activation: Activation,
    ) -> Self {
        Self {
            weight_mask: Some(weight_mask),
            bias_mask: Some(bias_mask),
            ..Self::new(weight, bias, activation)
        }
    }

    /// The weight used in the matmul: the stored parameter with the mask
    /// multiplied in when one is present.
    pub fn effective_weight(&self) -> Tensor<B, 2> {
        match &self.weight_mask {
            Some(mask) => self.weight.val() * mask.clone(),
            None => self.weight.val(),
        }
    }

    pub fn effective_bias(&self) -> Tensor<B, 1> {
        match &self.bias_mask {
            Some(mask) => self.bias.val() * mask.clone(),
            None => self.bias.val(),
        }
    }

    /// Returns `(logit, output)`: the pre-activation value and the
    /// activated value. The caller keeps the logit of the softmax layer
    /// for loss wiring.
    pub fn forward(&self, input: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let logit = input.matmul(self.effective_weight()) + self.effective_bias().unsqueeze::<2>();
        let output = match self.activation.0 {
            Activation::Identity => logit.clone(),
            Activation::Relu => relu(logit.clone()),
            Activation::Softmax => softmax(logit.clone(), 1),
        };
        (logit, output)
    }

    /// Overwrite the stored parameters with their masked values, keeping
    /// parameter ids (and with them any optimizer state) intact.
    pub fn reapply_masks(mut self) -> Self {
        if let Some(mask) = self.weight_mask.clone() {
            self.weight = self.weight.map(|w| (w * mask).detach().require_grad());
        }
        if let Some(mask) = self.bias_mask.clone() {
            self.bias = self.bias.map(|b| (b * mask).detach().require_grad());
        }
        self
    }
}

/// A convolutional layer computing `activation(pool(conv(input, weight) + bias))`.
///
/// `weight` is `[channels_out, channels_in, k, k]`. Convolution runs at
/// stride 1 with zero padding preserving the spatial size; pooling, when
/// configured, is a 2x2 window at stride 2. Relu and max pooling
/// commute, so activating the pooled value matches the historical
/// relu-then-pool order exactly.
#[derive(Module, Debug)]
pub struct ConvLayer<B: Backend> {
    pub weight: Param<Tensor<B, 4>>,
    pub bias: Param<Tensor<B, 1>>,
    pub weight_mask: Option<Tensor<B, 4>>,
    pub bias_mask: Option<Tensor<B, 1>>,
    pub pool: Option<MaxPool2d>,
    pub activation: Ignored<Activation>,
}

impl<B: Backend> ConvLayer<B> {
    pub fn new(
        weight: Tensor<B, 4>,
        bias: Tensor<B, 1>,
        pool: Option<MaxPool2d>,
        activation: Activation,
    ) -> Self {
        Self {
            weight: Param::from_tensor(weight),
            bias: Param::from_tensor(bias),
            weight_mask: None,
            bias_mask: None,
            pool,
            activation: Ignored(activation),
        }
    }

    pub fn masked(
        weight: Tensor<B, 4>,
        bias: Tensor<B, 1>,
        weight_mask: Tensor<B, 4>,
        bias_mask: Tensor<B, 1>,
        pool: Option<MaxPool2d>,
        activation: Activation,
    ) -> Self {
        Self {
            weight_mask: Some(weight_mask),
            bias_mask: Some(bias_mask),
            ..Self::new(weight, bias, pool, activation)
        }
    }

    pub fn effective_weight(&self) -> Tensor<B, 4> {
        match &self.weight_mask {
            Some(mask) => self.weight.val() * mask.clone(),
            None => self.weight.val(),
        }
    }

    pub fn effective_bias(&self) -> Tensor<B, 1> {
        match &self.bias_mask {
            Some(mask) => self.bias.val() * mask.clone(),
            None => self.bias.val(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, kernel_h, kernel_w] = self.weight.dims();
        let padding = [(kernel_h - 1) / 2, (kernel_w - 1) / 2];
        let x = conv2d(
            input,
            self.effective_weight(),
            Some(self.effective_bias()),
            ConvOptions::new([1, 1], padding, [1, 1], 1),
        );
        let x = match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        };
        match self.activation.0 {
            Activation::Identity => x,
            Activation::Relu => relu(x),
            Activation::Softmax => softmax(x, 1),
        }
    }

    pub fn reapply_masks(mut self) -> Self {
        if let Some(mask) = self.weight_mask.clone() {
            self.weight = self.weight.map(|w| (w * mask).detach().require_grad());
        }
        if let Some(mask) = self.bias_mask.clone() {
            self.bias = self.bias.map(|b| (b * mask).detach().require_grad());
        }
        self
    }
}

/// Either layer family, so a network holds one uniform ordered list.
#[derive(Module, Debug)]
pub enum Layer<B: Backend> {
    Dense(DenseLayer<B>),
    Conv(ConvLayer<B>),
}

impl<B: Backend> Layer<B> {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Dense(_) => LayerKind::Dense,
            Layer::Conv(_) => LayerKind::Conv,
        }
    }

    /// Current stored weight values (unmasked).
    pub fn weight_data(&self) -> TensorData {
        match self {
            Layer::Dense(layer) => layer.weight.val().into_data(),
            Layer::Conv(layer) => layer.weight.val().into_data(),
        }
    }

    /// Current stored bias values (unmasked).
    pub fn bias_data(&self) -> TensorData {
        match self {
            Layer::Dense(layer) => layer.bias.val().into_data(),
            Layer::Conv(layer) => layer.bias.val().into_data(),
        }
    }

    /// Sum of absolute weight entries, as a rank erased scalar tensor.
    pub fn weight_l1(&self) -> Tensor<B, 1> {
        match self {
            Layer::Dense(layer) => layer.weight.val().abs().sum(),
            Layer::Conv(layer) => layer.weight.val().abs().sum(),
        }
    }

    /// Half the sum of squared weight entries.
    pub fn weight_l2(&self) -> Tensor<B, 1> {
        match self {
            Layer::Dense(layer) => layer.weight.val().powf_scalar(2.0).sum().mul_scalar(0.5),
            Layer::Conv(layer) => layer.weight.val().powf_scalar(2.0).sum().mul_scalar(0.5),
        }
    }

    pub fn reapply_masks(self) -> Self {
        match self {
            Layer::Dense(layer) => Layer::Dense(layer.reapply_masks()),
            Layer::Conv(layer) => Layer::Conv(layer.reapply_masks()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::pool::MaxPool2dConfig;

    type TestBackend = burn::backend::NdArray<f32>;

    fn tensor2(device: &<TestBackend as Backend>::Device, rows: [[f32; 2]; 2]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::from(rows), device)
    }

    #[test]
    fn dense_forward_matches_hand_computed_matmul() {
        let device = Default::default();
        let layer = DenseLayer::new(
            tensor2(&device, [[1.0, 2.0], [3.0, 4.0]]),
            Tensor::from_data(TensorData::from([0.5, -0.5]), &device),
            Activation::Identity,
        );
        let input = tensor2(&device, [[1.0, 0.0], [0.0, 1.0]]);

        let (logit, output) = layer.forward(input);

        let expected = TensorData::from([[1.5f32, 1.5], [3.5, 3.5]]);
        logit.into_data().assert_approx_eq(&expected, 5);
        output.into_data().assert_approx_eq(&expected, 5);
    }

    #[test]
    fn relu_clips_negative_pre_activations() {
        let device = Default::default();
        let layer = DenseLayer::new(
            tensor2(&device, [[1.0, 0.0], [0.0, 1.0]]),
            Tensor::from_data(TensorData::from([0.0, 0.0]), &device),
            Activation::Relu,
        );
        let input = tensor2(&device, [[-3.0, 2.0], [4.0, -1.0]]);

        let (logit, output) = layer.forward(input);

        logit
            .into_data()
            .assert_approx_eq(&TensorData::from([[-3.0f32, 2.0], [4.0, -1.0]]), 5);
        output
            .into_data()
            .assert_approx_eq(&TensorData::from([[0.0f32, 2.0], [4.0, 0.0]]), 5);
    }

    #[test]
    fn masked_dense_silences_weights_and_biases() {
        let device = Default::default();
        let layer = DenseLayer::masked(
            tensor2(&device, [[1.0, 2.0], [3.0, 4.0]]),
            Tensor::from_data(TensorData::from([1.0, 1.0]), &device),
            tensor2(&device, [[1.0, 0.0], [0.0, 1.0]]),
            Tensor::from_data(TensorData::from([0.0, 1.0]), &device),
            Activation::Identity,
        );

        layer
            .effective_weight()
            .into_data()
            .assert_approx_eq(&TensorData::from([[1.0f32, 0.0], [0.0, 4.0]]), 5);
        layer
            .effective_bias()
            .into_data()
            .assert_approx_eq(&TensorData::from([0.0f32, 1.0]), 5);

        // The stored parameters are untouched by forward use.
        layer
            .weight
            .val()
            .into_data()
            .assert_approx_eq(&TensorData::from([[1.0f32, 2.0], [3.0, 4.0]]), 5);
    }

    #[test]
    fn reapply_masks_zeroes_the_stored_parameter() {
        let device = Default::default();
        let layer = DenseLayer::masked(
            tensor2(&device, [[1.0, 2.0], [3.0, 4.0]]),
            Tensor::from_data(TensorData::from([1.0, 1.0]), &device),
            tensor2(&device, [[1.0, 0.0], [0.0, 1.0]]),
            Tensor::from_data(TensorData::from([1.0, 1.0]), &device),
            Activation::Identity,
        );
        let id_before = layer.weight.id;

        let layer = layer.reapply_masks();

        layer
            .weight
            .val()
            .into_data()
            .assert_approx_eq(&TensorData::from([[1.0f32, 0.0], [0.0, 4.0]]), 5);
        // The parameter id survives, so optimizer state stays attached.
        assert_eq!(layer.weight.id, id_before);
    }

    #[test]
    fn conv_preserves_spatial_size_without_pooling() {
        let device = Default::default();
        let weight = Tensor::<TestBackend, 4>::ones([3, 1, 5, 5], &device);
        let bias = Tensor::<TestBackend, 1>::zeros([3], &device);
        let layer = ConvLayer::new(weight, bias, None, Activation::Relu);
        let input = Tensor::<TestBackend, 4>::ones([2, 1, 8, 8], &device);

        let output = layer.forward(input);

        assert_eq!(output.dims(), [2, 3, 8, 8]);
    }

    #[test]
    fn pooling_halves_each_spatial_dimension() {
        let device = Default::default();
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let weight = Tensor::<TestBackend, 4>::ones([4, 1, 5, 5], &device);
        let bias = Tensor::<TestBackend, 1>::zeros([4], &device);
        let layer = ConvLayer::new(weight, bias, Some(pool), Activation::Relu);
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 28, 28], &device);

        let output = layer.forward(input);

        assert_eq!(output.dims(), [1, 4, 14, 14]);
    }

    #[test]
    fn fully_masked_conv_outputs_only_the_bias() {
        let device = Default::default();
        let layer = ConvLayer::masked(
            Tensor::<TestBackend, 4>::ones([1, 1, 3, 3], &device),
            Tensor::from_data(TensorData::from([2.0f32]), &device),
            Tensor::<TestBackend, 4>::zeros([1, 1, 3, 3], &device),
            Tensor::from_data(TensorData::from([1.0f32]), &device),
            None,
            Activation::Identity,
        );
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device);

        let output = layer.forward(input);

        output
            .into_data()
            .assert_approx_eq(&TensorData::from([[[[2.0f32; 4]; 4]]]), 5);
    }
}
