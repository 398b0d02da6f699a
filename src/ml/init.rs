//! Parameter initialization.
//!
//! Fresh weights are drawn from a normal distribution truncated to two
//! standard deviations and scaled; biases start at a small positive
//! constant so relu units begin active. Burn's built in `Initializer`
//! covers plain normal draws but not truncation, so sampling happens
//! here and loads through `TensorData`.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::Rng;
use rand_distr::StandardNormal;

/// Scale of the truncated normal used for fresh weights.
pub const WEIGHT_STD: f64 = 0.1;

/// Value every fresh bias entry starts at.
pub const BIAS_VALUE: f64 = 0.1;

/// Draw `count` samples from a standard normal truncated to |z| <= 2,
/// scaled by `std`.
pub fn truncated_normal_vec(count: usize, std: f64, rng: &mut impl Rng) -> Vec<f32> {
    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let z: f64 = rng.sample(StandardNormal);
        if z.abs() <= 2.0 {
            values.push((z * std) as f32);
        }
    }
    values
}

/// A freshly initialized weight tensor of the given shape.
pub fn truncated_normal<B: Backend, const D: usize>(
    shape: [usize; D],
    std: f64,
    device: &B::Device,
    rng: &mut impl Rng,
) -> Tensor<B, D> {
    let count = shape.iter().product();
    let data = TensorData::new(truncated_normal_vec(count, std, rng), shape);
    Tensor::from_data(data, device)
}

/// A bias tensor with every entry set to `value`.
pub fn constant_bias<B: Backend, const D: usize>(
    shape: [usize; D],
    value: f64,
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::full(shape, value, device)
}
