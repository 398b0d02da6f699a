// ============================================================
// Layer 2 - Eval Use Case
// ============================================================
// Rebuilds a trained network from its checkpoint and reports
// classification accuracy over the held-out test split:
//   1. Load the saved TrainConfig
//   2. Rebuild the preset and load the latest weights
//   3. Stream the test set through the network, dropout off
//   4. Return the accuracy, weighted over partial final batches

use anyhow::Result;
use burn::data::dataloader::DataLoaderBuilder;
use std::path::Path;

use crate::data::{
    batcher::DigitBatcher,
    dataset::DigitDataset,
    loader::{load_digits, DigitFiles},
};
use crate::domain::network::ModelKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::classification_accuracy;
use crate::ml::network::{DenseNetConfig, LenetConfig, SoftmaxNetwork};

// Evaluation never needs gradients, so it runs on the plain backend.
type EvalBackend = burn::backend::NdArray<f32>;

pub struct EvalUseCase {
    data_dir: String,
    network: SoftmaxNetwork<EvalBackend>,
    batch_size: usize,
}

impl EvalUseCase {
    /// Load the saved configuration and the latest checkpoint.
    pub fn new(checkpoint_dir: String, data_dir: String) -> Result<Self> {
        let device = Default::default();
        let ckpt_manager = CheckpointManager::new(&checkpoint_dir);
        let cfg = ckpt_manager.load_config()?;

        let network: SoftmaxNetwork<EvalBackend> = match cfg.model {
            ModelKind::Lenet => LenetConfig::new().with_seed(cfg.seed).init(&device)?,
            ModelKind::Dense => DenseNetConfig::new().with_seed(cfg.seed).init(&device)?,
        };
        let network = ckpt_manager.load_network(network, &device)?;
        tracing::info!("Network loaded from checkpoint ({} preset)", cfg.model);

        Ok(Self {
            data_dir,
            network,
            batch_size: cfg.batch_size,
        })
    }

    /// Accuracy over the 10k test split, in [0, 1].
    pub fn accuracy(&self) -> Result<f64> {
        let device = Default::default();
        let test_items = load_digits(&DigitFiles::test(Path::new(&self.data_dir)))?;
        let test_dataset = DigitDataset::new(test_items);

        let batcher = DigitBatcher::<EvalBackend>::new(device);
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(self.batch_size)
            .num_workers(1)
            .build(test_dataset);

        let mut correct_weighted = 0.0f64;
        let mut total_samples = 0usize;

        for batch in loader.iter() {
            let batch_size = batch.images.dims()[0];
            let pass = self.network.forward(batch.images, 1.0);
            correct_weighted += classification_accuracy(pass.output, batch.targets) * batch_size as f64;
            total_samples += batch_size;
        }

        if total_samples == 0 {
            anyhow::bail!("the test split holds no samples");
        }
        Ok(correct_weighted / total_samples as f64)
    }
}
