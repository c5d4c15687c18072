//! SubQG multi-field reaction-diffusion substrate — spec §4.4.
//!
//! This is the host-side mirror of `mycelia-gpu`'s `subqg_simulation_step`
//! kernel (`crates/mycelia-gpu/src/kernels/subqg_step.cl`): the formulas
//! here must stay in lockstep with that source. Keeping both in the
//! workspace, rather than generating one from the other, matches how the
//! original driver keeps a CPU fallback path alongside its GPU kernels.
//!
//! The kernel intentionally reads neighbouring cells from the *in-flight*
//! buffer without a barrier — "the race condition is the entropy source".
//! This host mirror is run single-threaded over a snapshot of the previous
//! tick, so it is reproducible by construction; the non-deterministic path
//! is only reachable on the real GPU kernel, which this type does not
//! execute. Record here, rather than silently "fix", that divergence.

use mycelia_core::{MycelError, MycelResult};

use crate::rng::SplitMix64;

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSnapshot {
    pub energy: f32,
    pub phase: f32,
    pub interference: f32,
    pub node_flag: f32,
    pub spin: f32,
    pub topology: f32,
    pub pressure: f32,
    pub gravity: f32,
    pub magnetism: f32,
    pub temperature: f32,
    pub potential: f32,
    pub drift_x: f32,
    pub drift_y: f32,
}

pub struct SubQGState {
    pub w: usize,
    pub h: usize,
    pub noise_level: f32,
    pub threshold: f32,
    pub deterministic: bool,
    pub noise_factor: f32,
    rng: SplitMix64,

    pub energy: Vec<f32>,
    pub phase: Vec<f32>,
    pub interference: Vec<f32>,
    pub node_flag: Vec<f32>,
    pub spin: Vec<f32>,
    pub topology: Vec<f32>,
    pub pressure: Vec<f32>,
    pub gravity: Vec<f32>,
    pub magnetism: Vec<f32>,
    pub temperature: Vec<f32>,
    pub potential: Vec<f32>,
    pub drift_x: Vec<f32>,
    pub drift_y: Vec<f32>,
    pub field_map: Vec<f32>,
}

impl SubQGState {
    pub fn new(w: usize, h: usize, noise_level: f32, threshold: f32, deterministic: bool, seed: u64) -> MycelResult<Self> {
        if w == 0 || h == 0 {
            return Err(MycelError::Validation("SubQG grid dimensions must be > 0".into()));
        }
        let c = w * h;
        Ok(Self {
            w,
            h,
            noise_level,
            threshold,
            deterministic,
            noise_factor: 1.0,
            rng: SplitMix64::new(seed),
            energy: vec![0.0; c],
            phase: vec![0.0; c],
            interference: vec![0.0; c],
            node_flag: vec![0.0; c],
            spin: vec![0.0; c],
            topology: vec![0.0; c],
            pressure: vec![0.0; c],
            gravity: vec![0.0; c],
            magnetism: vec![0.0; c],
            temperature: vec![0.0; c],
            potential: vec![0.0; c],
            drift_x: vec![0.0; c],
            drift_y: vec![0.0; c],
            field_map: vec![0.0; c],
        })
    }

    pub fn cells(&self) -> usize {
        self.w * self.h
    }

    fn gen_rng_triplet(&mut self) -> MycelResult<(Vec<f32>, Vec<f32>, Vec<f32>)> {
        if !self.deterministic {
            return Err(MycelError::Validation(
                "no external RNG arrays supplied and engine is not deterministic".into(),
            ));
        }
        let c = self.cells();
        let mut e = vec![0.0f32; c];
        let mut p = vec![0.0f32; c];
        let mut s = vec![0.0f32; c];
        self.rng.fill(&mut e);
        self.rng.fill(&mut p);
        self.rng.fill(&mut s);
        Ok((e, p, s))
    }

    /// One simulation step, per spec §4.4's exact algorithmic contract.
    /// If `external_rng` is `None`, internal RNG is used when
    /// `deterministic`, otherwise the step is refused.
    pub fn step(
        &mut self,
        external_rng: Option<(&[f32], &[f32], &[f32])>,
        write_field_map: bool,
    ) -> MycelResult<()> {
        let c = self.cells();
        let (rng_e, rng_p, rng_s) = match external_rng {
            Some((e, p, s)) => {
                if e.len() != c || p.len() != c || s.len() != c {
                    return Err(MycelError::Validation("RNG array length mismatch".into()));
                }
                (e.to_vec(), p.to_vec(), s.to_vec())
            }
            None => self.gen_rng_triplet()?,
        };

        let w = self.w as i64;
        let h = self.h as i64;
        let noise_factor = self.noise_factor;
        let noise_level = self.noise_level;
        let threshold = self.threshold;

        let energy_prev = self.energy.clone();
        let pressure_prev = self.pressure.clone();
        let gravity_prev = self.gravity.clone();
        let temperature_prev = self.temperature.clone();
        let potential_prev = self.potential.clone();
        let phase_prev = self.phase.clone();
        let drift_x_prev = self.drift_x.clone();
        let drift_y_prev = self.drift_y.clone();

        for i in 0..c {
            let x = (i as i64) % w;
            let y = (i as i64) / w;
            let xm = (x - 1).max(0) as usize;
            let xp = (x + 1).min(w - 1) as usize;
            let ym = (y - 1).max(0) as usize;
            let yp = (y + 1).min(h - 1) as usize;
            let yw = y as usize * self.w;

            let e = energy_prev[i];
            let p = pressure_prev[i];
            let g = gravity_prev[i];
            let t = temperature_prev[i];
            let v = potential_prev[i];
            let phi = phase_prev[i];

            let e_lap = energy_prev[yw + xm] + energy_prev[yw + xp] + energy_prev[ym * self.w + x as usize]
                + energy_prev[yp * self.w + x as usize]
                - 4.0 * e;

            let noise = (rng_e[i] - 0.5) * 2.0 * noise_level * noise_factor;

            let new_e = (e + 0.10 * e_lap + noise).clamp(-1.0, 1.0);
            let new_p = (p + 0.08 * (e_lap * 0.5) + 0.05 * new_e).clamp(-1.0, 1.0);
            let new_g = (g + 0.02 * (v * 0.3)).clamp(-1.0, 1.0);
            let new_t = (t + 0.05 * (e_lap * 0.2) + 0.03 * new_e).clamp(-1.0, 1.0);
            let new_v = (v + 0.04 * ((new_p + new_g) * 0.5 - v)).clamp(-1.0, 1.0);

            let dx = 0.95 * drift_x_prev[i]
                + 0.05 * (energy_prev[yw + xp] - energy_prev[yw + xm]);
            let dy = 0.95 * drift_y_prev[i]
                + 0.05 * (energy_prev[yp * self.w + x as usize] - energy_prev[ym * self.w + x as usize]);
            let drift_mag = (dx * dx + dy * dy).sqrt();
            let new_m = (self.magnetism[i] + 0.03 * drift_mag).clamp(-1.0, 1.0);

            let new_phi = (phi.clamp(-1.0, 1.0).asin() / std::f32::consts::PI * std::f32::consts::PI
                + rng_p[i] * 0.2)
                .sin();

            let interference = 0.5 * new_e + 0.3 * new_p + 0.2 * new_t;
            let headroom = 1.0 - threshold;
            let lo = threshold + headroom * 0.33;
            let hi = threshold + headroom * 0.66;
            let node_flag = if interference > lo { 1.0 } else { 0.0 };
            let spin = if rng_s[i] > 0.5 { 1.0 } else { -1.0 };
            let topology = if interference > hi { 1.0 } else { 0.0 };

            self.energy[i] = new_e;
            self.phase[i] = new_phi;
            self.interference[i] = interference;
            self.node_flag[i] = node_flag;
            self.spin[i] = spin;
            self.topology[i] = topology;
            self.pressure[i] = new_p;
            self.gravity[i] = new_g;
            self.magnetism[i] = new_m;
            self.temperature[i] = new_t;
            self.potential[i] = new_v;
            self.drift_x[i] = dx;
            self.drift_y[i] = dy;

            if write_field_map {
                let fm = (0.4 * new_e + 0.2 * new_p + 0.2 * new_t + 0.2 * new_v + 1.0) * 0.5;
                self.field_map[i] = fm.clamp(0.0, 1.0);
            }
        }

        Ok(())
    }

    pub fn read_at(&self, idx: usize) -> FieldSnapshot {
        FieldSnapshot {
            energy: self.energy[idx],
            phase: self.phase[idx],
            interference: self.interference[idx],
            node_flag: self.node_flag[idx],
            spin: self.spin[idx],
            topology: self.topology[idx],
            pressure: self.pressure[idx],
            gravity: self.gravity[idx],
            magnetism: self.magnetism[idx],
            temperature: self.temperature[idx],
            potential: self.potential[idx],
            drift_x: self.drift_x[idx],
            drift_y: self.drift_y[idx],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_4x4_ten_steps_stays_in_bounds() {
        let mut state = SubQGState::new(4, 4, 0.01, 0.5, true, 42).unwrap();
        for _ in 0..10 {
            state.step(None, true).unwrap();
        }
        for &e in &state.energy {
            assert!(e.is_finite());
            assert!((-1.0..=1.0).contains(&e));
        }
        for &fm in &state.field_map {
            assert!((0.0..=1.0).contains(&fm));
            assert!(fm.is_finite());
        }
    }

    #[test]
    fn refuses_step_without_rng_when_not_deterministic() {
        let mut state = SubQGState::new(2, 2, 0.01, 0.5, false, 1).unwrap();
        assert!(state.step(None, false).is_err());
    }

    #[test]
    fn rejects_zero_sized_grid() {
        assert!(SubQGState::new(0, 4, 0.01, 0.5, true, 1).is_err());
    }

    #[test]
    fn external_rng_length_mismatch_is_validation_error() {
        let mut state = SubQGState::new(2, 2, 0.01, 0.5, true, 1).unwrap();
        let bad = vec![0.5f32; 1];
        let err = state.step(Some((&bad, &bad, &bad)), false);
        assert!(err.is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;

    proptest::proptest! {
        #[test]
        fn fields_always_clamp_to_unit_interval(seed in 1u64..10_000, steps in 1usize..8) {
            let mut state = SubQGState::new(4, 4, 0.05, 0.4, true, seed).unwrap();
            for _ in 0..steps {
                state.step(None, true).unwrap();
            }
            for &e in &state.energy {
                proptest::prop_assert!((-1.0..=1.0).contains(&e));
            }
            for &fm in &state.field_map {
                proptest::prop_assert!((0.0..=1.0).contains(&fm));
            }
        }
    }
}
