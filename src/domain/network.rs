//! Engine free vocabulary describing network structure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// The two layer families a network is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Fully connected: `activation(input . weight + bias)`.
    Dense,
    /// Convolutional: `activation(pool(conv(input, weight) + bias))`.
    Conv,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Dense => f.write_str("dense"),
            LayerKind::Conv => f.write_str("conv"),
        }
    }
}

/// Activation applied to a layer's pre-activation output.
///
/// Exactly one layer per network, the last, uses `Softmax`; assembly
/// assigns `Relu` to every other layer. `Identity` exists for direct
/// layer use outside an assembled network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Relu,
    Softmax,
}

/// What happens to masked parameters after an optimizer step.
///
/// Masks silence parameters in the forward computation under either
/// policy. The stored parameter is a separate question: regularizer
/// gradients and optimizer internal state can still move it at masked
/// positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskPolicy {
    /// Overwrite each masked parameter with its masked value after every
    /// optimizer step, so stored zeros stay exactly zero.
    #[default]
    ReapplyAfterStep,
    /// Apply masks only inside the forward computation; stored values at
    /// masked positions may drift during training.
    ForwardOnly,
}

/// The two ready made network presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Two pooled 5x5 convolutions (32, 64 channels) into 3136-512-10.
    Lenet,
    /// Fully connected 784-300-100-10.
    Dense,
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenet" => Ok(ModelKind::Lenet),
            "dense" => Ok(ModelKind::Dense),
            other => Err(ModelError::InvalidConfig(format!(
                "unknown model preset '{other}', expected 'lenet' or 'dense'"
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Lenet => f.write_str("lenet"),
            ModelKind::Dense => f.write_str("dense"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_kind_parses_case_insensitively() {
        assert_eq!("lenet".parse::<ModelKind>().unwrap(), ModelKind::Lenet);
        assert_eq!("Dense".parse::<ModelKind>().unwrap(), ModelKind::Dense);
    }

    #[test]
    fn unknown_model_kind_is_invalid_config() {
        let err = "resnet".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig(_)));
    }

    #[test]
    fn default_mask_policy_reapplies() {
        assert_eq!(MaskPolicy::default(), MaskPolicy::ReapplyAfterStep);
    }
}
