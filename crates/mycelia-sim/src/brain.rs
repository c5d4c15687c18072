//! Brain bridge, Izhikevich neuron layer, and the tiled social-Hebbian
//! update — spec §4.7.

use mycelia_core::config::{DEFAULT_HEBBIAN_CHUNK_ROWS, DEFAULT_HEBBIAN_MAX_BYTES};
use mycelia_core::MycelResult;

pub struct BrainState {
    pub n: usize,
    pub v: Vec<f32>,
    pub u: Vec<f32>,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
    pub c: Vec<f32>,
    pub d: Vec<f32>,
    pub current: Vec<f32>,
    pub spikes: Vec<f32>,
    pub activity: Vec<f32>,
    pub weights: Vec<f32>, // N x N social weights matrix
}

impl BrainState {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            v: vec![-65.0; n],
            u: vec![-13.0; n],
            a: vec![0.02; n],
            b: vec![0.2; n],
            c: vec![-65.0; n],
            d: vec![8.0; n],
            current: vec![0.0; n],
            spikes: vec![0.0; n],
            activity: vec![0.0; n],
            weights: vec![0.0; n * n],
        }
    }

    /// `brain_bridge_cycle`: reads SubQG energy/phase, writes neuron input
    /// current and the nutrient floor, updates activity from last-tick
    /// spikes (spec §4.7).
    pub fn bridge_cycle(
        &mut self,
        energy: &[f32],
        phase: &[f32],
        nutrient: &mut [f32],
        sensory_gain: f32,
        motor_gain: f32,
    ) {
        for i in 0..self.n {
            let e = energy[i];
            let sensory = e.abs() * (1.0 + 0.5 * phase[i].sin());
            self.current[i] = sensory * sensory_gain;
            nutrient[i] = nutrient[i].max(0.1 * e);
            if self.spikes[i] > 0.0 {
                self.activity[i] += motor_gain;
            } else {
                self.activity[i] *= 0.95;
            }
        }
    }

    /// Izhikevich Heun step: two half-dt Euler sub-steps, spike-and-reset
    /// on `v >= threshold` (spec §4.7).
    pub fn izhikevich_step(&mut self, dt: f32, threshold: f32) {
        let half_dt = dt * 0.5;
        for i in 0..self.n {
            let (vi, ui, ai, bi) = (self.v[i], self.u[i], self.a[i], self.b[i]);
            let current = self.current[i];

            let dv1 = 0.04 * vi * vi + 5.0 * vi + 140.0 - ui + current;
            let du1 = ai * (bi * vi - ui);
            let v_mid = vi + half_dt * dv1;
            let u_mid = ui + half_dt * du1;

            let dv2 = 0.04 * v_mid * v_mid + 5.0 * v_mid + 140.0 - u_mid + current;
            let du2 = ai * (bi * v_mid - u_mid);
            let v_new = vi + half_dt * dv2;
            let u_new = ui + half_dt * du2;

            if v_new >= threshold {
                self.spikes[i] = 1.0;
                self.v[i] = self.c[i];
                self.u[i] = u_new + self.d[i];
            } else {
                self.spikes[i] = 0.0;
                self.v[i] = v_new;
                self.u[i] = u_new;
            }
        }
    }

    /// Tiled N×N outer-product Hebbian update of the spike vector on
    /// itself, chunked by rows with an abort check between chunks. Refuses
    /// (with a warning, not a hard error) to allocate beyond
    /// `max_bytes` (default 64 MiB, spec §4.7 / §9).
    pub fn social_hebbian(
        &mut self,
        lr: f32,
        chunk_rows: usize,
        max_bytes: u64,
        mut should_abort: impl FnMut() -> bool,
    ) -> MycelResult<bool> {
        let chunk_rows = if chunk_rows == 0 {
            DEFAULT_HEBBIAN_CHUNK_ROWS
        } else {
            chunk_rows
        };
        let total_bytes = (self.n * self.n * std::mem::size_of::<f32>()) as u64;
        if total_bytes > max_bytes {
            log::warn!(
                "social_hebbian: weight matrix {total_bytes} bytes exceeds cap {max_bytes}, skipping"
            );
            return Ok(false);
        }

        let mut row = 0usize;
        while row < self.n {
            if should_abort() {
                return Ok(false);
            }
            let end = (row + chunk_rows).min(self.n);
            for i in row..end {
                let si = self.spikes[i];
                for j in 0..self.n {
                    self.weights[i * self.n + j] += lr * si * self.spikes[j];
                }
            }
            row = end;
        }
        Ok(true)
    }
}

impl Default for BrainState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_cycle_floors_nutrient_and_decays_activity_without_spikes() {
        let mut brain = BrainState::new(2);
        let mut nutrient = vec![0.0, 0.0];
        brain.activity = vec![1.0, 1.0];
        brain.bridge_cycle(&[0.5, -0.2], &[0.0, 0.0], &mut nutrient, 1.0, 1.0);
        assert!((nutrient[0] - 0.05).abs() < 1e-6);
        assert!((brain.activity[0] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn izhikevich_resets_on_threshold_crossing() {
        let mut brain = BrainState::new(1);
        brain.v[0] = 29.0;
        brain.current[0] = 50.0;
        brain.izhikevich_step(1.0, 30.0);
        assert_eq!(brain.spikes[0], 1.0);
        assert_eq!(brain.v[0], brain.c[0]);
    }

    #[test]
    fn hebbian_respects_byte_cap() {
        let mut brain = BrainState::new(8);
        brain.spikes = vec![1.0; 8];
        let ok = brain.social_hebbian(0.01, 4, 4, || false).unwrap();
        assert!(!ok); // 8*8*4 = 256 bytes > 4-byte cap, skipped
        assert!(brain.weights.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn hebbian_aborts_between_chunks() {
        let mut brain = BrainState::new(8);
        brain.spikes = vec![1.0; 8];
        let mut calls = 0;
        let ok = brain
            .social_hebbian(0.01, 2, DEFAULT_HEBBIAN_MAX_BYTES, || {
                calls += 1;
                calls > 1
            })
            .unwrap();
        assert!(!ok);
    }
}
