// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the idx-ubyte digit files  (Layer 4 - data)
//   Step 2: Build train/test datasets       (Layer 4 - data)
//   Step 3: Save config for evaluation      (Layer 6 - infra)
//   Step 4: Run the training loop           (Layer 5 - ml)
//
// The training loop itself builds the network preset, attaches
// the optimizer and regularizer, and drives the epoch loop.
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    dataset::DigitDataset,
    loader::{load_digits, DigitFiles},
};
use crate::domain::algorithm::TrainingAlgorithm;
use crate::domain::network::{MaskPolicy, ModelKind};
use crate::domain::schedule::LrSchedule;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved to disk and reloaded for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir: String,
    pub checkpoint_dir: String,
    /// Which network preset to build: lenet or dense
    pub model: ModelKind,
    /// One of the five gradient descent variants
    pub algorithm: TrainingAlgorithm,
    /// Staircase learning rate decay
    pub schedule: LrSchedule,
    /// Uniform l1 penalty weight over non-exempt layers, if any
    pub l1: Option<f64>,
    /// Uniform l2 penalty weight over non-exempt layers, if any
    pub l2: Option<f64>,
    /// Probability a dense-layer input survives dropout during training
    pub keep_prob: f64,
    /// Whether pruning masks are written back after each step
    pub mask_policy: MaskPolicy,
    pub epochs: usize,
    pub batch_size: usize,
    /// Seed for weight initialization and batch shuffling
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/mnist".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            model: ModelKind::Lenet,
            algorithm: TrainingAlgorithm::Adam,
            schedule: LrSchedule::default(),
            l1: None,
            l2: None,
            keep_prob: 0.5,
            mask_policy: MaskPolicy::default(),
            epochs: 5,
            batch_size: 64,
            seed: 42,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        let data_dir = Path::new(&cfg.data_dir);

        // ── Step 1: Load the digit files ─────────────────────────────────────
        tracing::info!("Loading digit data from '{}'", cfg.data_dir);
        let train_items = load_digits(&DigitFiles::train(data_dir))?;
        let test_items = load_digits(&DigitFiles::test(data_dir))?;
        tracing::info!(
            "Loaded {} training and {} test samples",
            train_items.len(),
            test_items.len()
        );

        // ── Step 2: Build Burn datasets ──────────────────────────────────────
        // DigitDataset implements Burn's Dataset trait so the DataLoader
        // can call .get(index) and .len() on it
        let train_dataset = DigitDataset::new(train_items);
        let test_dataset = DigitDataset::new(test_items);

        // ── Step 3: Save config for evaluation ───────────────────────────────
        // Evaluation needs to know the preset to rebuild the network
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 4: Run training loop (Layer 5) ──────────────────────────────
        run_training(cfg, train_dataset, test_dataset, ckpt_manager, metrics)?;

        Ok(())
    }
}
