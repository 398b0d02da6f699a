use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One grayscale digit: pixels flattened row-major, scaled to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitItem {
    pub pixels: Vec<f32>,
    pub label: u8,
}

pub struct DigitDataset {
    items: Vec<DigitItem>,
}

impl DigitDataset {
    pub fn new(items: Vec<DigitItem>) -> Self {
        Self { items }
    }

    pub fn sample_count(&self) -> usize {
        self.items.len()
    }
}

impl Dataset<DigitItem> for DigitDataset {
    fn get(&self, index: usize) -> Option<DigitItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
