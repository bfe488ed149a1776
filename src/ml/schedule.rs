// ============================================================
// Layer 5: Learning-Rate Schedule
// ============================================================
// A pure function of the 1-based update count n:
//
//   n ≤ warmup : lr · n / warmup                       (linear warm-up)
//   n > warmup : lr · factor ^ ⌊(n − warmup − 1) / interval⌋ (step decay)
//
// The first `interval` updates after warm-up run at the full rate.
//
// No state is kept between calls, so the Trainer can ask for any
// update's rate and two runs with the same config see the same rates.

use serde::{Deserialize, Serialize};

use crate::error::{NmtError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRateSchedule {
    pub start_rate:     f64,
    pub warmup_steps:   usize,
    pub decay_factor:   f64,
    pub decay_interval: usize,
}

impl LearningRateSchedule {
    pub fn new(
        start_rate:     f64,
        warmup_steps:   usize,
        decay_factor:   f64,
        decay_interval: usize,
    ) -> Result<Self> {
        if !(start_rate.is_finite() && start_rate > 0.0) {
            return Err(NmtError::config("learning rate must be a positive finite number"));
        }
        if !(decay_factor > 0.0 && decay_factor <= 1.0) {
            return Err(NmtError::config("decay factor must be in (0, 1]"));
        }
        if decay_interval == 0 {
            return Err(NmtError::config("decay interval must be > 0"));
        }
        Ok(Self { start_rate, warmup_steps, decay_factor, decay_interval })
    }

    /// Fixed rate, no warm-up or decay.
    pub fn constant(rate: f64) -> Result<Self> {
        Self::new(rate, 0, 1.0, 1)
    }

    /// Rate for update `update` (1-based; 0 is treated as 1).
    pub fn rate(&self, update: usize) -> f64 {
        let n = update.max(1);
        if n <= self.warmup_steps {
            return self.start_rate * n as f64 / self.warmup_steps as f64;
        }
        let decays = (n - self.warmup_steps - 1) / self.decay_interval;
        self.start_rate * self.decay_factor.powi(decays.min(i32::MAX as usize) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let s = LearningRateSchedule::constant(0.5).unwrap();
        assert_eq!(s.rate(1), 0.5);
        assert_eq!(s.rate(10_000), 0.5);
    }

    #[test]
    fn test_warmup_then_decay() {
        let s = LearningRateSchedule::new(1.0, 4, 0.5, 10).unwrap();
        assert_eq!(s.rate(1), 0.25);
        assert_eq!(s.rate(4), 1.0);
        assert_eq!(s.rate(14), 1.0);
        assert_eq!(s.rate(15), 0.5);
        assert_eq!(s.rate(24), 0.5);
        assert_eq!(s.rate(25), 0.25);
    }

    #[test]
    fn test_first_update_runs_at_start_rate_without_warmup() {
        let s = LearningRateSchedule::new(0.8, 0, 0.5, 1).unwrap();
        assert_eq!(s.rate(1), 0.8);
        assert_eq!(s.rate(2), 0.4);
        assert_eq!(s.rate(3), 0.2);

        let s = LearningRateSchedule::new(0.8, 0, 0.5, 3).unwrap();
        assert_eq!(s.rate(3), 0.8);
        assert_eq!(s.rate(4), 0.4);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(LearningRateSchedule::new(0.0, 0, 0.5, 1).is_err());
        assert!(LearningRateSchedule::new(1.0, 0, 1.5, 1).is_err());
        assert!(LearningRateSchedule::new(1.0, 0, 0.5, 0).is_err());
    }
}
