//! The closed set of supported training algorithms.
//!
//! The historical configuration surface selected the algorithm with a
//! string name or its ordinal position. Both spellings are still
//! accepted at the configuration boundary, but once parsed the choice
//! is a plain enum, so an unsupported algorithm cannot reach the
//! training loop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// The five supported gradient descent variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingAlgorithm {
    /// Plain stochastic gradient descent.
    GradientDescent,
    /// Gradient descent scaled by a running average of squared gradients.
    RmsProp,
    /// Adaptive moments (Kingma and Ba, 2015).
    Adam,
    /// Per parameter rates from accumulated squared gradients.
    AdaGrad,
    /// Unit free adaptive steps from running gradient and update
    /// averages (Zeiler, 2012).
    AdaDelta,
}

impl TrainingAlgorithm {
    /// Every variant, in ordinal order.
    pub const ALL: [TrainingAlgorithm; 5] = [
        TrainingAlgorithm::GradientDescent,
        TrainingAlgorithm::RmsProp,
        TrainingAlgorithm::Adam,
        TrainingAlgorithm::AdaGrad,
        TrainingAlgorithm::AdaDelta,
    ];

    /// The historical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            TrainingAlgorithm::GradientDescent => "GD",
            TrainingAlgorithm::RmsProp => "RMSProp",
            TrainingAlgorithm::Adam => "Adam",
            TrainingAlgorithm::AdaGrad => "AdaGrad",
            TrainingAlgorithm::AdaDelta => "AdaDelta",
        }
    }

    /// Resolve an ordinal selector: 0 = GD through 4 = AdaDelta.
    pub fn from_ordinal(ordinal: usize) -> Result<Self, ModelError> {
        Self::ALL.get(ordinal).copied().ok_or_else(|| {
            ModelError::InvalidConfig(format!(
                "unknown training algorithm ordinal {ordinal}, expected 0 through 4"
            ))
        })
    }

    /// Resolve a selector that may be a name or an ordinal, the two
    /// spellings the configuration surface accepts.
    pub fn from_selector(selector: &str) -> Result<Self, ModelError> {
        if let Ok(ordinal) = selector.parse::<usize>() {
            return Self::from_ordinal(ordinal);
        }
        selector.parse()
    }
}

impl FromStr for TrainingAlgorithm {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GD" => Ok(TrainingAlgorithm::GradientDescent),
            "RMSProp" => Ok(TrainingAlgorithm::RmsProp),
            "Adam" => Ok(TrainingAlgorithm::Adam),
            "AdaGrad" => Ok(TrainingAlgorithm::AdaGrad),
            "AdaDelta" => Ok(TrainingAlgorithm::AdaDelta),
            other => Err(ModelError::InvalidConfig(format!(
                "unknown training algorithm '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TrainingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
