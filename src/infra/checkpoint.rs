// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores network weights using Burn's gzipped
// MessagePack recorder at full precision.
//
// What gets saved per checkpoint:
//   1. Network weights (.mpk.gz file) — all trainable parameters
//   2. latest_epoch.json              — which epoch was last saved
//   3. train_config.json              — preset and hyperparameters
//
// Why save the config separately?
//   When loading for evaluation we need to know the exact
//   architecture (preset, seed) to rebuild the network before
//   loading the weights into it. Without the config, we can't
//   reconstruct the network.
//
// One caveat specific to pruning: Burn records carry trainable
// parameters only. Mask tensors are constants, so they are NOT part
// of the record — a caller reconstructing a pruned network supplies
// the masks again through the builder and then loads the record.
//
// File naming convention:
//   checkpoints/
//     network_epoch_1.mpk.gz  <- weights after epoch 1
//     network_epoch_2.mpk.gz  <- weights after epoch 2
//     ...
//     latest_epoch.json       <- contains the number of latest epoch
//     train_config.json       <- training configuration
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::Backend,
};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::ml::network::SoftmaxNetwork;

/// Manages saving and loading of network checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        // create_dir_all creates parent directories too, like `mkdir -p`
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Save network weights for a given epoch.
    ///
    /// Uses Burn's NamedMpkGzFileRecorder which:
    ///   1. Calls network.into_record() to extract all parameters
    ///   2. Serialises to MessagePack binary format
    ///   3. Compresses with gzip
    ///   4. Writes to {dir}/network_epoch_{epoch}.mpk.gz
    pub fn save_network<B: Backend>(
        &self,
        network: &SoftmaxNetwork<B>,
        epoch: usize,
    ) -> Result<()> {
        // Build the file path (without extension — recorder adds it)
        let path = self.dir.join(format!("network_epoch_{epoch}"));

        NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
            .record(network.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        // Update the latest epoch pointer so evaluation knows
        // which file to load
        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load network weights from the latest saved checkpoint.
    ///
    /// Steps:
    ///   1. Read latest_epoch.json to find the epoch number
    ///   2. Load the corresponding .mpk.gz file
    ///   3. Call network.load_record() to restore weights
    ///
    /// The network parameter must have the correct architecture
    /// (matching the saved checkpoint) or loading will fail.
    pub fn load_network<B: Backend>(
        &self,
        network: SoftmaxNetwork<B>,
        device: &B::Device,
    ) -> Result<SoftmaxNetwork<B>> {
        let epoch = self.latest_epoch()?;
        let path = self.dir.join(format!("network_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;

        // load_record() returns a new network with the loaded weights
        Ok(network.load_record(record))
    }

    /// Save the training configuration to JSON.
    ///
    /// This must be called before training starts so evaluation
    /// can reconstruct the exact architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");

        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    ///
    /// Called by evaluation to know what architecture was used
    /// during training so it can rebuild the same network.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'eval'.",
                path.display()
            )
        })?;

        Ok(serde_json::from_str(&json)?)
    }

    /// Read latest_epoch.json and return the epoch number.
    /// Returns an error if training hasn't been run yet.
    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path).with_context(|| {
            "Cannot find 'latest_epoch.json'. Have you run 'train' first?"
        })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
