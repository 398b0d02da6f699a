//! Weight penalty configuration for the training loss.
//!
//! Penalties apply to weights only, never to biases, and they read the
//! stored parameter values, not the masked ones. A uniform weight leaves
//! the first two tensors unpenalized; per tensor weights apply exactly
//! as given and must cover every layer.

use crate::domain::error::{ModelError, ModelResult};

/// How many leading tensors a uniform penalty weight skips.
pub const EXEMPT_TENSORS: usize = 2;

/// One penalty family (l1 or l2) before it is matched to a network.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PenaltyWeights {
    #[default]
    None,
    /// One scalar fanned out to every layer past the exempt prefix.
    Uniform(f64),
    /// One weight per layer, in layer order.
    PerTensor(Vec<f64>),
}

impl PenaltyWeights {
    fn resolve(&self, layer_count: usize, label: &str) -> ModelResult<Vec<f64>> {
        match self {
            PenaltyWeights::None => Ok(vec![0.0; layer_count]),
            PenaltyWeights::Uniform(weight) => {
                let mut weights = vec![*weight; layer_count];
                for slot in weights.iter_mut().take(EXEMPT_TENSORS) {
                    *slot = 0.0;
                }
                Ok(weights)
            }
            PenaltyWeights::PerTensor(weights) => {
                if weights.len() != layer_count {
                    return Err(ModelError::InvalidConfig(format!(
                        "{label} regularization weights cover {} tensors but the network has {} layers",
                        weights.len(),
                        layer_count
                    )));
                }
                Ok(weights.clone())
            }
        }
    }
}

/// Penalty weights expanded against a concrete layer count, one slot per
/// layer for each family.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPenalty {
    pub l1: Vec<f64>,
    pub l2: Vec<f64>,
}

/// The user facing penalty choice, resolved at attach time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Regularizer {
    pub l1: PenaltyWeights,
    pub l2: PenaltyWeights,
}

impl Regularizer {
    pub fn new(l1: PenaltyWeights, l2: PenaltyWeights) -> Self {
        Self { l1, l2 }
    }

    pub fn l1(weight: f64) -> Self {
        Self {
            l1: PenaltyWeights::Uniform(weight),
            l2: PenaltyWeights::None,
        }
    }

    pub fn l2(weight: f64) -> Self {
        Self {
            l1: PenaltyWeights::None,
            l2: PenaltyWeights::Uniform(weight),
        }
    }

    pub fn resolve(&self, layer_count: usize) -> ModelResult<ResolvedPenalty> {
        Ok(ResolvedPenalty {
            l1: self.l1.resolve(layer_count, "l1")?,
            l2: self.l2.resolve(layer_count, "l2")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_weight_skips_the_first_two_layers() {
        let resolved = Regularizer::l1(0.3).resolve(4).unwrap();

        assert_eq!(resolved.l1, vec![0.0, 0.0, 0.3, 0.3]);
        assert_eq!(resolved.l2, vec![0.0; 4]);
    }

    #[test]
    fn uniform_weight_on_a_short_network_penalizes_nothing() {
        let resolved = Regularizer::l2(0.5).resolve(2).unwrap();

        assert_eq!(resolved.l2, vec![0.0, 0.0]);
    }

    #[test]
    fn per_tensor_weights_apply_exactly_as_given() {
        let regularizer = Regularizer::new(
            PenaltyWeights::PerTensor(vec![0.1, 0.2, 0.3]),
            PenaltyWeights::None,
        );

        let resolved = regularizer.resolve(3).unwrap();

        assert_eq!(resolved.l1, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn per_tensor_length_mismatch_is_rejected() {
        let regularizer = Regularizer::new(
            PenaltyWeights::None,
            PenaltyWeights::PerTensor(vec![0.1, 0.2]),
        );

        let err = regularizer.resolve(3).unwrap_err();

        assert!(matches!(err, ModelError::InvalidConfig(_)));
        assert!(err.to_string().contains("cover 2 tensors"));
    }

    #[test]
    fn default_regularizer_resolves_to_all_zeros() {
        let resolved = Regularizer::default().resolve(3).unwrap();

        assert_eq!(resolved.l1, vec![0.0; 3]);
        assert_eq!(resolved.l2, vec![0.0; 3]);
    }
}
