//! Adaptive noise-factor feedback loop — spec §4.2.
//!
//! A tiny global-ish scalar (owned by the `Driver`, not a `static`, per the
//! Design Notes) that shapes stochastic terms in the SubQG stepper based on
//! observed per-kernel timing variance. Writes are last-writer-wins and
//! deliberately unlocked (spec §5).

use mycelia_core::config::{NOISE_FACTOR_MAX, NOISE_FACTOR_MIN, NOISE_THRESH_HIGH, NOISE_THRESH_LOW};

#[derive(Debug, Clone, Copy)]
pub struct NoiseController {
    pub noise_factor: f32,
}

impl Default for NoiseController {
    fn default() -> Self {
        Self { noise_factor: 1.0 }
    }
}

impl NoiseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observed `variance` into the controller; returns the
    /// updated `noise_factor`.
    pub fn update(&mut self, variance: f32) -> f32 {
        if variance > NOISE_THRESH_HIGH {
            self.noise_factor *= 0.9;
        } else if variance < NOISE_THRESH_LOW {
            self.noise_factor *= 1.1;
        }
        self.noise_factor = self.noise_factor.clamp(NOISE_FACTOR_MIN, NOISE_FACTOR_MAX);
        self.noise_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_bounds_under_any_sequence() {
        let mut nc = NoiseController::new();
        for v in [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0] {
            nc.update(v);
        }
        assert!(nc.noise_factor >= NOISE_FACTOR_MIN);
        let mut nc2 = NoiseController::new();
        for _ in 0..50 {
            nc2.update(0.1);
        }
        assert!(nc2.noise_factor <= NOISE_FACTOR_MAX);
    }

    #[test]
    fn high_variance_is_monotone_non_increasing() {
        let mut nc = NoiseController::new();
        let mut prev = nc.noise_factor;
        for _ in 0..5 {
            let next = nc.update(2.0);
            assert!(next <= prev);
            prev = next;
        }
    }

    #[test]
    fn low_variance_is_monotone_non_decreasing() {
        let mut nc = NoiseController::new();
        nc.noise_factor = 0.2;
        let mut prev = nc.noise_factor;
        for _ in 0..5 {
            let next = nc.update(0.1);
            assert!(next >= prev);
            prev = next;
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;

    proptest::proptest! {
        #[test]
        fn noise_factor_always_in_range(variances in proptest::collection::vec(0.0f32..3.0f32, 0..64)) {
            let mut nc = NoiseController::new();
            for v in variances {
                let f = nc.update(v);
                proptest::prop_assert!(f >= NOISE_FACTOR_MIN && f <= NOISE_FACTOR_MAX);
            }
        }
    }
}
