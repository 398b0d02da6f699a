// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `eval`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::algorithm::TrainingAlgorithm;
use crate::domain::error::ModelError;
use crate::domain::network::{MaskPolicy, ModelKind};
use crate::domain::schedule::LrSchedule;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a digit classifier on the idx-ubyte dataset
    Train(TrainArgs),

    /// Report test-set accuracy using a trained checkpoint
    Eval(EvalArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing the idx-ubyte digit files
    #[arg(long, default_value = "data/mnist")]
    pub data_dir: String,

    /// Directory to save checkpoints, config, and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Network preset: "lenet" (conv) or "dense" (fully connected)
    #[arg(long, default_value = "lenet")]
    pub model: String,

    /// Training algorithm, by name (GD, RMSProp, Adam, AdaGrad,
    /// AdaDelta) or by ordinal 0-4
    #[arg(long, default_value = "Adam")]
    pub algorithm: String,

    /// Learning rate before any decay
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// Factor the learning rate drops by at each decay step
    #[arg(long, default_value_t = 0.95)]
    pub decay_rate: f64,

    /// Number of training steps between learning rate drops
    #[arg(long, default_value_t = 100)]
    pub decay_step: usize,

    /// Uniform l1 penalty weight (the first two tensors are exempt)
    #[arg(long)]
    pub l1: Option<f64>,

    /// Uniform l2 penalty weight (the first two tensors are exempt)
    #[arg(long)]
    pub l2: Option<f64>,

    /// Probability a dense-layer input survives dropout during training
    #[arg(long, default_value_t = 0.5)]
    pub keep_prob: f64,

    /// Apply pruning masks only in the forward pass, letting stored
    /// values drift at masked positions (the historical behaviour)
    #[arg(long, default_value_t = false)]
    pub forward_only_masks: bool,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    /// Number of samples processed together in one forward pass
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Seed for weight initialization and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 — the application
/// layer never sees clap types. The conversion is fallible because the
/// model preset and algorithm selector are free-form strings; an
/// unrecognised value surfaces as an invalid-configuration error here,
/// before any work starts.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = ModelError;

    fn try_from(a: TrainArgs) -> Result<Self, Self::Error> {
        let model: ModelKind = a.model.parse()?;
        let algorithm = TrainingAlgorithm::from_selector(&a.algorithm)?;
        let mask_policy = if a.forward_only_masks {
            MaskPolicy::ForwardOnly
        } else {
            MaskPolicy::ReapplyAfterStep
        };
        Ok(TrainConfig {
            data_dir: a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            model,
            algorithm,
            schedule: LrSchedule::new(a.lr, a.decay_rate, a.decay_step),
            l1: a.l1,
            l2: a.l2,
            keep_prob: a.keep_prob,
            mask_policy,
            epochs: a.epochs,
            batch_size: a.batch_size,
            seed: a.seed,
        })
    }
}

/// All arguments for the `eval` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Directory with the idx-ubyte files (same as used during training)
    #[arg(long, default_value = "data/mnist")]
    pub data_dir: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> TrainArgs {
        TrainArgs {
            data_dir: "data/mnist".into(),
            checkpoint_dir: "checkpoints".into(),
            model: "dense".into(),
            algorithm: "3".into(),
            lr: 0.1,
            decay_rate: 0.9,
            decay_step: 50,
            l1: None,
            l2: Some(0.001),
            keep_prob: 0.8,
            forward_only_masks: true,
            epochs: 2,
            batch_size: 32,
            seed: 7,
        }
    }

    #[test]
    fn train_args_convert_into_a_config() {
        let cfg = TrainConfig::try_from(args()).unwrap();

        assert_eq!(cfg.model, ModelKind::Dense);
        assert_eq!(cfg.algorithm, TrainingAlgorithm::AdaGrad);
        assert_eq!(cfg.schedule, LrSchedule::new(0.1, 0.9, 50));
        assert_eq!(cfg.mask_policy, MaskPolicy::ForwardOnly);
        assert_eq!(cfg.l2, Some(0.001));
    }

    #[test]
    fn unknown_algorithm_selector_fails_at_the_boundary() {
        let mut bad = args();
        bad.algorithm = "Foo".into();

        let err = TrainConfig::try_from(bad).unwrap_err();

        assert!(matches!(err, ModelError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_model_preset_fails_at_the_boundary() {
        let mut bad = args();
        bad.model = "vgg".into();

        assert!(TrainConfig::try_from(bad).is_err());
    }
}
