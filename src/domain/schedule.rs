//! The staircase learning rate schedule.

use serde::{Deserialize, Serialize};

/// Exponential learning rate decay with discrete steps:
///
/// ```text
/// rate(step) = initial_lr * decay_rate ^ (step / decay_step)
/// ```
///
/// with integer division, so the rate stays constant for `decay_step`
/// training steps and then drops by a factor of `decay_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrSchedule {
    pub initial_lr: f64,
    pub decay_rate: f64,
    pub decay_step: usize,
}

impl LrSchedule {
    pub fn new(initial_lr: f64, decay_rate: f64, decay_step: usize) -> Self {
        Self {
            initial_lr,
            decay_rate,
            decay_step,
        }
    }

    /// The rate in effect at a given zero based training step.
    /// `decay_step` must be nonzero; attachment validates that before
    /// any step runs.
    pub fn rate_at(&self, step: usize) -> f64 {
        self.initial_lr * self.decay_rate.powi((step / self.decay_step) as i32)
    }
}

impl Default for LrSchedule {
    /// The historical defaults: 0.01, decayed by 0.95 every 100 steps.
    fn default() -> Self {
        Self::new(0.01, 0.95, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_flat_within_a_stair() {
        let schedule = LrSchedule::new(0.4, 0.5, 2);
        assert_eq!(schedule.rate_at(0), 0.4);
        assert_eq!(schedule.rate_at(1), 0.4);
    }

    #[test]
    fn rate_drops_by_the_decay_factor_each_stair() {
        let schedule = LrSchedule::new(0.4, 0.5, 2);
        assert_eq!(schedule.rate_at(2), 0.2);
        assert_eq!(schedule.rate_at(3), 0.2);
        assert_eq!(schedule.rate_at(4), 0.1);
    }

    #[test]
    fn defaults_match_the_historical_values() {
        let schedule = LrSchedule::default();
        assert_eq!(schedule.initial_lr, 0.01);
        assert_eq!(schedule.decay_rate, 0.95);
        assert_eq!(schedule.decay_step, 100);
    }
}
