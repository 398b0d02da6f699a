// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Full train + evaluation loop using Burn's DataLoader and the
// DigitClassifier lifecycle.
//
// Key backend insight:
//   - Training uses MyBackend (Autodiff<NdArray>) for gradients
//   - compute_accuracy runs on MyInnerBackend (NdArray), so the
//     evaluation batcher must also use MyInnerBackend
//   - dropout is driven by the configured keep probability during
//     training and disabled (1.0) for every accuracy query
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::data::dataloader::DataLoaderBuilder;

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::DigitBatcher, dataset::DigitDataset};
use crate::domain::network::ModelKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::DigitClassifier;
use crate::ml::network::{DenseNetConfig, LenetConfig, SoftmaxNetwork};
use crate::ml::regularizer::{PenaltyWeights, Regularizer};

type MyBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
type MyInnerBackend = burn::backend::NdArray<f32>;

pub fn run_training(
    cfg: &TrainConfig,
    train_dataset: DigitDataset,
    test_dataset: DigitDataset,
    ckpt_manager: CheckpointManager,
    metrics: MetricsLogger,
) -> Result<()> {
    let device = Default::default();

    // ── Build the classifier from the configured preset ───────────────────────
    let network: SoftmaxNetwork<MyBackend> = match cfg.model {
        ModelKind::Lenet => LenetConfig::new().with_seed(cfg.seed).init(&device)?,
        ModelKind::Dense => DenseNetConfig::new().with_seed(cfg.seed).init(&device)?,
    };
    tracing::info!(
        "Network ready: {} preset, layers {:?}",
        cfg.model,
        network.layer_kinds()
    );

    let mut classifier = DigitClassifier::new(network).with_mask_policy(cfg.mask_policy);
    classifier.attach_optimizer(cfg.algorithm, cfg.schedule)?;
    if cfg.l1.is_some() || cfg.l2.is_some() {
        let regularizer = Regularizer::new(
            cfg.l1.map_or(PenaltyWeights::None, PenaltyWeights::Uniform),
            cfg.l2.map_or(PenaltyWeights::None, PenaltyWeights::Uniform),
        );
        classifier.add_regularizer(regularizer)?;
    }
    classifier.create_initializer();
    classifier.initialize()?;
    tracing::info!("Training with {} at lr={}", cfg.algorithm, cfg.schedule.initial_lr);

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = DigitBatcher::<MyBackend>::new(device);
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // ── Evaluation data loader (InnerBackend — no autodiff overhead) ──────────
    let test_batcher = DigitBatcher::<MyInnerBackend>::new(device);
    let test_loader = DataLoaderBuilder::new(test_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(test_dataset);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches = 0usize;

        for batch in train_loader.iter() {
            let loss = classifier.train(batch.images, batch.targets, cfg.keep_prob)?;
            train_loss_sum += loss;
            train_batches += 1;
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else {
            f64::NAN
        };

        // ── Evaluation phase, dropout disabled ────────────────────────────────
        let mut correct_weighted = 0.0f64;
        let mut total_samples = 0usize;

        for batch in test_loader.iter() {
            let batch_size = batch.images.dims()[0];
            let accuracy = classifier.compute_accuracy(batch.images, batch.targets)?;
            correct_weighted += accuracy * batch_size as f64;
            total_samples += batch_size;
        }

        let test_accuracy = if total_samples > 0 {
            correct_weighted / total_samples as f64
        } else {
            0.0
        };
        let learning_rate = classifier.learning_rate()?;

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | test_acc={:.1}% | lr={:.6}",
            epoch,
            cfg.epochs,
            avg_train_loss,
            test_accuracy * 100.0,
            learning_rate,
        );

        metrics.log(&EpochMetrics::new(
            epoch,
            avg_train_loss,
            test_accuracy,
            learning_rate,
        ))?;
        ckpt_manager.save_network(classifier.network(), epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(())
}
