// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Why log metrics to CSV?
//   - Easy to open in Excel or Google Sheets
//   - Can plot learning curves to diagnose training issues
//   - Provides a permanent record of each training run
//
// Metrics recorded per epoch:
//   - epoch:         the epoch number (1, 2, 3, ...)
//   - train_loss:    average batch loss on the training set
//   - test_accuracy: fraction of test digits classified correctly
//   - learning_rate: the rate applied by the last step of the epoch
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,test_accuracy,learning_rate
//   1,0.412500,0.912300,0.010000
//   2,0.198100,0.941200,0.009500
//   ...
//
// How to read the metrics:
//   - Loss should decrease each epoch (model is learning)
//   - Accuracy should increase each epoch
//   - The learning rate follows the staircase schedule down
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Average loss over all training batches, the weight penalty
    /// included when one is configured.
    /// Random initialisation gives ~ln(10) for ten classes
    pub train_loss: f64,

    /// Fraction of test digits classified correctly
    /// Range: [0.0, 1.0] — 1.0 means every digit was recognised
    pub test_accuracy: f64,

    /// The learning rate the optimizer applied most recently
    pub learning_rate: f64,
}

impl EpochMetrics {
    /// Create a new EpochMetrics record
    pub fn new(epoch: usize, train_loss: f64, test_accuracy: f64, learning_rate: f64) -> Self {
        Self {
            epoch,
            train_loss,
            test_accuracy,
            learning_rate,
        }
    }

    /// Returns true if this epoch improved over the previous best accuracy
    pub fn is_improvement(&self, best_accuracy: f64) -> bool {
        self.test_accuracy > best_accuracy
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Write CSV header only if file is new.
        // This allows appending to an existing log across runs.
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,test_accuracy,learning_rate")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    ///
    /// Uses OpenOptions with append=true so we add to the file
    /// without overwriting previous epochs.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.test_accuracy, m.learning_rate,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, test_accuracy={:.4}",
            m.epoch,
            m.train_loss,
            m.test_accuracy,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 0.4, 0.93, 0.0095);
        // 0.93 > 0.90 → this is an improvement
        assert!(m.is_improvement(0.90));
        // 0.93 is NOT greater than 0.95 → not an improvement
        assert!(!m.is_improvement(0.95));
    }

    #[test]
    fn log_appends_rows_under_the_header() {
        let dir = std::env::temp_dir().join(format!("prunenet-metrics-{}", std::process::id()));
        let logger = MetricsLogger::new(dir.to_string_lossy()).unwrap();

        logger.log(&EpochMetrics::new(1, 0.5, 0.9, 0.01)).unwrap();
        logger.log(&EpochMetrics::new(2, 0.4, 0.92, 0.0095)).unwrap();

        let contents = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,test_accuracy,learning_rate");
        assert!(lines[1].starts_with("1,0.500000,0.900000"));
        assert!(lines[2].starts_with("2,0.400000,0.920000"));
        fs::remove_dir_all(dir).unwrap();
    }
}
