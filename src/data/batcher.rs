// ============================================================
// Layer 4 - Digit Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<DigitItem>
// into the tensors the training loop consumes.
//
// How batching works here:
//   Input:  Vec of N DigitItems, each with F pixels and a label
//   Output: DigitBatch with images [N, F] and targets [N, 10]
//
//   Pixels are already flat per item, so the image tensor is one
//   long Vec<f32> reshaped to [N, F]. Labels become one-hot rows
//   because the loss is a softmax cross entropy over raw scores,
//   not an index-based one.
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::DigitItem;

/// Width of a one-hot target row.
pub const NUM_CLASSES: usize = 10;

/// A batch of digits ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct DigitBatch<B: Backend> {
    /// Pixel rows, shape [batch_size, features]
    pub images: Tensor<B, 2>,
    /// One-hot labels, shape [batch_size, 10]
    pub targets: Tensor<B, 2>,
}

/// Holds the target device so tensors land on the right backend.
#[derive(Clone, Debug)]
pub struct DigitBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> DigitBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<DigitItem, DigitBatch<B>> for DigitBatcher<B> {
    /// Convert a Vec of DigitItems into a single DigitBatch.
    ///
    /// Steps:
    ///   1. Concatenate all pixel rows into one flat Vec<f32>
    ///   2. Reshape to [batch_size, features]
    ///   3. Scatter each label into a one-hot row of width 10
    fn batch(&self, items: Vec<DigitItem>) -> DigitBatch<B> {
        let batch_size = items.len();
        // All items in a batch share the same image size
        let features = items[0].pixels.len();

        let mut pixels = Vec::with_capacity(batch_size * features);
        for item in &items {
            pixels.extend_from_slice(&item.pixels);
        }

        let mut one_hot = vec![0.0f32; batch_size * NUM_CLASSES];
        for (row, item) in items.iter().enumerate() {
            one_hot[row * NUM_CLASSES + item.label as usize] = 1.0;
        }

        let images = Tensor::from_data(
            TensorData::new(pixels, [batch_size, features]),
            &self.device,
        );
        let targets = Tensor::from_data(
            TensorData::new(one_hot, [batch_size, NUM_CLASSES]),
            &self.device,
        );

        DigitBatch { images, targets }
    }
}
