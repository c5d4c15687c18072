//! Agent population & policy update — spec §4.6.
//!
//! Each agent is a 256-float record: semantic fields at offsets 0..27
//! (position, drives, goals, micro-neurons), a 25-action x 5-feature
//! softmax policy plus 25 biases starting at offset 64. Two swap buffers
//! (in/out) let the orchestrator publish the new "current" handle at the
//! end of each cycle without copying 256 floats * count agents in place.

use mycelia_core::{MycelError, MycelResult};
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub const AGENT_STRIDE: usize = 256;
pub const POLICY_OFFSET: usize = 64;
pub const NUM_ACTIONS: usize = 25;
pub const NUM_FEATURES: usize = 5;
pub const POLICY_WEIGHTS_LEN: usize = NUM_ACTIONS * NUM_FEATURES;
pub const POLICY_BIAS_OFFSET: usize = POLICY_OFFSET + POLICY_WEIGHTS_LEN;

// Semantic field offsets (spec §4.6).
pub mod field {
    pub const POS_X: usize = 0;
    pub const POS_Y: usize = 1;
    pub const ENERGY: usize = 2;
    pub const HEADING: usize = 3;
    pub const SPEED: usize = 4;
    pub const TEMP_PREF: usize = 5;
    pub const POTENTIAL_PREF: usize = 6;
    pub const DRIFT_BIAS: usize = 7;
    pub const AGE: usize = 8;
    pub const HEALTH: usize = 9;
    pub const FATIGUE: usize = 10;
    pub const STRESS: usize = 11;
    pub const EMOTION: usize = 12;
    pub const NEED_FOOD: usize = 13;
    pub const NEED_SOCIAL: usize = 14;
    pub const NEED_SAFETY: usize = 15;
    pub const SELECTED_ACTION: usize = 16;
    pub const REWARD: usize = 17;
    pub const COLONY_ID: usize = 18;
    pub const GOALS_START: usize = 19; // 19..24
    pub const FEAR_OF_DEATH: usize = 25;
    pub const GRIEF: usize = 26;
    pub const BOREDOM: usize = 27;
    pub const MICRO_NEURON_START: usize = 32; // 32..37
}

pub struct AgentPopulation {
    pub count: usize,
    pub stride: usize,
    current: Vec<f32>,
    scratch: Vec<f32>,
    pub gradients: Vec<f32>,
    pub adam_m: Vec<f32>,
    pub adam_v: Vec<f32>,
    using_current_as_in: bool,
}

/// Sampled field/cell context the policy step reads at the agent's
/// position, sourced from the SubQG field-map.
pub struct AgentSensedField {
    pub energy: f32,
    pub temperature: f32,
    pub potential: f32,
    pub drift_x: f32,
    pub drift_y: f32,
}

impl AgentPopulation {
    pub fn new(count: usize, stride: usize) -> MycelResult<Self> {
        if stride < AGENT_STRIDE {
            return Err(MycelError::Validation(format!(
                "agent stride {stride} is below the minimum of {AGENT_STRIDE}"
            )));
        }
        let n = count * stride;
        Ok(Self {
            count,
            stride,
            current: vec![0.0; n],
            scratch: vec![0.0; n],
            gradients: vec![0.0; n],
            adam_m: vec![0.0; n],
            adam_v: vec![0.0; n],
            using_current_as_in: true,
        })
    }

    /// Seed small Gaussian policy weights/biases for every agent, per
    /// `init_mycel`'s side effect on the agent population (spec §4.5).
    pub fn seed_policy_gaussian(&mut self, sigma: f32, rng: &mut impl Rng) {
        let normal = Normal::new(0.0f32, sigma).expect("sigma must be finite and nonnegative");
        for a in 0..self.count {
            let base = a * self.stride;
            for i in 0..POLICY_WEIGHTS_LEN {
                self.current[base + POLICY_OFFSET + i] = normal.sample(rng);
            }
            for i in 0..NUM_ACTIONS {
                self.current[base + POLICY_BIAS_OFFSET + i] = normal.sample(rng);
            }
        }
    }

    pub fn in_buf(&self) -> &[f32] {
        if self.using_current_as_in {
            &self.current
        } else {
            &self.scratch
        }
    }

    pub fn out_buf_mut(&mut self) -> &mut [f32] {
        if self.using_current_as_in {
            &mut self.scratch
        } else {
            &mut self.current
        }
    }

    /// Swap in/out handles; called once per autonomous cycle after the
    /// policy kernel and before Adam, per spec §4.8.
    pub fn swap(&mut self) {
        self.using_current_as_in = !self.using_current_as_in;
    }

    /// `update_genetic_agents`: one forward-policy-step per tick (spec
    /// §4.6). `sense` maps an agent's normalized position to a sampled
    /// field reading (nearest-cell rounding against `w`x`h`).
    pub fn update_policy(
        &mut self,
        w: usize,
        h: usize,
        sense: impl Fn(usize, usize) -> AgentSensedField,
        reward_scale: f32,
        colony_ids: Option<&[u8]>,
    ) -> MycelResult<()> {
        if w == 0 || h == 0 {
            return Err(MycelError::Validation("SubQG grid must be initialized before agent update".into()));
        }
        let count = self.count;
        let stride = self.stride;
        let input = self.in_buf().to_vec();
        let output = self.out_buf_mut();
        output.copy_from_slice(&input);

        for a in 0..count {
            let base = a * stride;
            let x = input[base + field::POS_X].clamp(0.0, 1.0);
            let y = input[base + field::POS_Y].clamp(0.0, 1.0);
            let cx = ((x * w as f32) as usize).min(w - 1);
            let cy = ((y * h as f32) as usize).min(h - 1);
            let sensed = sense(cx, cy);

            let heading = input[base + field::HEADING];
            let drift_heading = sensed.drift_y.atan2(sensed.drift_x);

            let features = [
                sensed.energy,
                sensed.temperature,
                sensed.potential,
                sensed.drift_x,
                sensed.drift_y,
            ];

            let weights = &input[base + POLICY_OFFSET..base + POLICY_OFFSET + POLICY_WEIGHTS_LEN];
            let biases = &input[base + POLICY_BIAS_OFFSET..base + POLICY_BIAS_OFFSET + NUM_ACTIONS];

            let mut logits = [0.0f32; NUM_ACTIONS];
            for act in 0..NUM_ACTIONS {
                let mut logit = biases[act];
                for (f, &feat) in features.iter().enumerate() {
                    logit += weights[act * NUM_FEATURES + f] * feat;
                }
                // goal bias: goals occupy 19..24, action index maps 1:1 when in range.
                if act < 6 {
                    logit += input[base + field::GOALS_START + act.min(5)] * 0.1;
                }
                logits[act] = logit;
            }

            let max_logit = logits.iter().cloned().fold(f32::MIN, f32::max);
            let mut exps = [0.0f32; NUM_ACTIONS];
            let mut denom = 0.0f32;
            for act in 0..NUM_ACTIONS {
                exps[act] = (logits[act] - max_logit).exp();
                denom += exps[act];
            }
            let probs: Vec<f32> = exps.iter().map(|&e| e / denom).collect();

            let mut selected = 0usize;
            let mut best = f32::MIN;
            for (act, &p) in probs.iter().enumerate() {
                if p > best {
                    best = p;
                    selected = act;
                }
            }

            let reward = sensed.energy;
            output[base + field::SELECTED_ACTION] = selected as f32;
            output[base + field::REWARD] = reward;

            match selected {
                1 => output[base + field::NEED_FOOD] = (input[base + field::NEED_FOOD] - 0.1).max(0.0),
                5 => output[base + field::HEADING] = drift_heading,
                _ => output[base + field::HEADING] = heading,
            }

            if let Some(colonies) = colony_ids {
                if let Some(&cid) = colonies.get(a) {
                    output[base + field::COLONY_ID] = cid as f32;
                }
            }

            for act in 0..NUM_ACTIONS {
                let onehot = if act == selected { 1.0 } else { 0.0 };
                let dlogit = (probs[act] - onehot) * reward_scale * reward;
                for (f, &feat) in features.iter().enumerate() {
                    self.gradients[base + POLICY_OFFSET + act * NUM_FEATURES + f] = dlogit * feat;
                }
                self.gradients[base + POLICY_BIAS_OFFSET + act] = dlogit;
            }
        }

        Ok(())
    }

    /// `adam_update(out, grads, m, v, n, t, lr, beta1, beta2, eps, wd)` —
    /// spec §4.6, applied over the full parameter buffer.
    pub fn adam_update(&mut self, t: u32, lr: f32, beta1: f32, beta2: f32, eps: f32, wd: f32) {
        let params = self.out_buf_mut();
        let bias_correction1 = 1.0 - beta1.powi(t as i32);
        let bias_correction2 = 1.0 - beta2.powi(t as i32);
        for i in 0..params.len() {
            let g = self.gradients[i] + wd * params[i];
            let m = beta1 * self.adam_m[i] + (1.0 - beta1) * g;
            let v = beta2 * self.adam_v[i] + (1.0 - beta2) * g * g;
            self.adam_m[i] = m;
            self.adam_v[i] = v;
            let m_hat = m / bias_correction1;
            let v_hat = v / bias_correction2;
            params[i] -= lr * m_hat / (v_hat.sqrt() + eps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn stride_below_minimum_is_rejected() {
        assert!(AgentPopulation::new(4, 128).is_err());
    }

    #[test]
    fn policy_step_writes_valid_action_and_reward() {
        let mut pop = AgentPopulation::new(2, AGENT_STRIDE).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        pop.seed_policy_gaussian(0.1, &mut rng);
        pop.update_policy(
            4,
            4,
            |_x, _y| AgentSensedField {
                energy: 0.5,
                temperature: 0.1,
                potential: 0.2,
                drift_x: 0.0,
                drift_y: 0.0,
            },
            1.0,
            None,
        )
        .unwrap();
        for a in 0..2 {
            let base = a * AGENT_STRIDE;
            let action = pop.out_buf_mut()[base + field::SELECTED_ACTION];
            assert!(action >= 0.0 && action < NUM_ACTIONS as f32);
        }
    }

    #[test]
    fn adam_update_reduces_gradient_norm_on_a_toy_target() {
        let mut pop = AgentPopulation::new(1, AGENT_STRIDE).unwrap();
        for g in pop.gradients.iter_mut() {
            *g = 1.0;
        }
        let before = pop.out_buf_mut()[POLICY_OFFSET];
        pop.adam_update(1, 0.01, 0.9, 0.999, 1e-8, 0.0);
        let after = pop.out_buf_mut()[POLICY_OFFSET];
        assert!(after < before);
    }
}
