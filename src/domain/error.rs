//! The error vocabulary of the model lifecycle.
//!
//! Two failure families cover everything the core can refuse:
//!
//!   NotReady      — a lifecycle step ran before the step it depends on
//!                   (train before an optimizer is attached, initialize
//!                   before the initializer snapshot exists, inspection
//!                   before initialization).
//!
//!   InvalidConfig — a configuration value cannot be used (unknown
//!                   training algorithm, regularizer weights that do not
//!                   line up with the layers, a zero decay step, a
//!                   keep probability outside (0, 1]).
//!
//! Tensor shape mismatches between batches and layer dimensions are NOT
//! re-validated here; the tensor engine reports those itself.

use thiserror::Error;

/// Errors surfaced by model construction and the training lifecycle.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A lifecycle step ran before the step it depends on.
    #[error("Not ready: {0}")]
    NotReady(&'static str),

    /// A configuration value cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Shorthand for results carrying a [`ModelError`].
pub type ModelResult<T> = Result<T, ModelError>;
