//! Mycel pheromone graph engine — spec §4.5.
//!
//! Sparse K-neighbour graph over `t_cap` cells with per-edge per-channel
//! pheromone, per-cell nutrient/mood, colony labels, and a free-list stack
//! for reproduction. Mirrors `mycelia-gpu`'s `mycel.cl` kernels; kept as a
//! host-side implementation so the invariants in spec §8 are directly
//! testable.

use mycelia_core::{MycelError, MycelResult};
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub struct ReproParams {
    pub threshold_nutrient: f32,
    pub threshold_activity: f32,
    pub mutation_sigma: f32,
}

pub struct MycelState {
    pub t_cap: usize,
    pub c: usize,
    pub k: usize,
    pub t_act: usize,

    pub pheromone: Vec<f32>,   // [T*K*C]
    pub neigh_idx: Vec<i32>,   // [T*K], -1 == no edge
    pub decay: Vec<f32>,       // [T*K]
    pub diffu: Vec<f32>,       // [T*K]
    pub nutrient: Vec<f32>,    // [T]
    pub mood: Vec<f32>,        // [T*C]
    pub colony_id: Vec<u8>,    // [T]
    pub alive: Vec<bool>,      // [T]
    pub potential: Vec<f32>,   // [T]
    pub subqg_field: Vec<f32>, // [T]

    pub reinforce_gain: Vec<f32>, // [C]
    pub kappa_mood: Vec<f32>,     // [C]
    pub kappa_nutrient: f32,
    pub nutrient_recovery: f32,
    pub decay_default: f32,
    pub diffu_default: f32,
    pub repro: ReproParams,

    free_list: Vec<usize>,
    free_head: usize,
}

impl MycelState {
    /// Allocate all host arrays; seed pheromone with `U[0, 0.1]`; mark the
    /// first `t_act` cells alive with colony ids in `[1, 255]`; push the
    /// rest onto the free-list stack.
    pub fn init(t_cap: usize, c: usize, k: usize, t_act: usize, rng: &mut impl Rng) -> MycelResult<Self> {
        if t_cap == 0 || c == 0 || k == 0 {
            return Err(MycelError::Validation("t_cap, c, and k must all be > 0".into()));
        }
        if t_act > t_cap {
            return Err(MycelError::Validation("t_act cannot exceed t_cap".into()));
        }

        let mut pheromone = vec![0.0f32; t_cap * k * c];
        for p in pheromone.iter_mut() {
            *p = rng.gen_range(0.0..0.1);
        }

        let mut alive = vec![false; t_cap];
        let mut colony_id = vec![0u8; t_cap];
        for i in 0..t_act {
            alive[i] = true;
            colony_id[i] = ((i % 255) + 1) as u8;
        }

        let mut free_list = vec![0usize; t_cap];
        let mut free_head = 0usize;
        for i in (t_act..t_cap).rev() {
            free_list[free_head] = i;
            free_head += 1;
        }

        Ok(Self {
            t_cap,
            c,
            k,
            t_act,
            pheromone,
            neigh_idx: vec![-1; t_cap * k],
            decay: vec![0.05; t_cap * k],
            diffu: vec![0.1; t_cap * k],
            nutrient: vec![0.0; t_cap],
            mood: vec![0.0; t_cap * c],
            colony_id,
            alive,
            potential: vec![0.0; t_cap],
            subqg_field: vec![0.0; t_cap],
            reinforce_gain: vec![1.0; c],
            kappa_mood: vec![0.1; c],
            kappa_nutrient: 0.5,
            nutrient_recovery: 0.05,
            decay_default: 0.05,
            diffu_default: 0.1,
            repro: ReproParams {
                threshold_nutrient: 0.5,
                threshold_activity: 0.5,
                mutation_sigma: 0.05,
            },
            free_list,
            free_head,
        })
    }

    pub fn free_count(&self) -> usize {
        self.free_head
    }

    /// Raw free-list stack contents (length `t_cap`), for persistence.
    pub fn free_list_view(&self) -> Vec<i32> {
        self.free_list.iter().map(|&v| v as i32).collect()
    }

    /// Reconstruct a `MycelState` from previously-saved parts, per spec
    /// §4.11's load contract: dimensions are taken as recorded, arrays are
    /// assigned verbatim.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        t_cap: usize,
        c: usize,
        k: usize,
        t_act: usize,
        free_head: usize,
        alive: Vec<bool>,
        colony_id: Vec<u8>,
        free_list: Vec<usize>,
        nutrient: Vec<f32>,
        mood: Vec<f32>,
        reinforce_gain: Vec<f32>,
        kappa_mood: Vec<f32>,
        neigh_idx: Vec<i32>,
        decay: Vec<f32>,
        diffu: Vec<f32>,
        pheromone: Vec<f32>,
        potential: Vec<f32>,
        subqg_field: Vec<f32>,
        repro: ReproParams,
        decay_default: f32,
        diffu_default: f32,
        nutrient_recovery: f32,
        kappa_nutrient: f32,
    ) -> MycelResult<Self> {
        if t_cap == 0 || c == 0 || k == 0 {
            return Err(MycelError::Validation("t_cap, c, and k must all be > 0".into()));
        }
        Ok(Self {
            t_cap,
            c,
            k,
            t_act,
            pheromone,
            neigh_idx,
            decay,
            diffu,
            nutrient,
            mood,
            colony_id,
            alive,
            potential,
            subqg_field,
            reinforce_gain,
            kappa_mood,
            kappa_nutrient,
            nutrient_recovery,
            decay_default,
            diffu_default,
            repro,
            free_list,
            free_head,
        })
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Bijection invariant: `alive_count + free_head == t_cap`, and no free
    /// slot is marked alive (spec §8).
    pub fn check_alive_free_bijection(&self) -> bool {
        if self.alive_count() + self.free_head != self.t_cap {
            return false;
        }
        self.free_list[..self.free_head].iter().all(|&i| !self.alive[i])
    }

    pub fn set_neighbors_sparse(&mut self, neigh_idx: Vec<i32>) -> MycelResult<()> {
        if neigh_idx.len() != self.t_cap * self.k {
            return Err(MycelError::Validation("neighbor array length mismatch".into()));
        }
        self.neigh_idx = neigh_idx;
        Ok(())
    }

    pub fn set_diffusion_params(&mut self, decay_default: f32, diffu_default: f32) {
        self.decay_default = decay_default;
        self.diffu_default = diffu_default;
        self.decay.fill(decay_default);
        self.diffu.fill(diffu_default);
    }

    pub fn set_pheromone_gains(&mut self, gains: Vec<f32>) -> MycelResult<()> {
        if gains.len() != self.c {
            return Err(MycelError::Validation("reinforce_gain length mismatch".into()));
        }
        self.reinforce_gain = gains;
        Ok(())
    }

    pub fn set_mood_state(&mut self, mood: Vec<f32>) -> MycelResult<()> {
        if mood.len() != self.t_cap * self.c {
            return Err(MycelError::Validation("mood array length mismatch".into()));
        }
        self.mood = mood;
        Ok(())
    }

    pub fn set_nutrient_state(&mut self, nutrient: Vec<f32>) -> MycelResult<()> {
        if nutrient.len() != self.t_cap {
            return Err(MycelError::Validation("nutrient array length mismatch".into()));
        }
        self.nutrient = nutrient;
        Ok(())
    }

    pub fn set_repro_params(&mut self, threshold_nutrient: f32, threshold_activity: f32, mutation_sigma: f32) {
        self.repro = ReproParams {
            threshold_nutrient,
            threshold_activity,
            mutation_sigma,
        };
    }

    pub fn set_nutrient_recovery(&mut self, recovery: f32) {
        self.nutrient_recovery = recovery;
    }

    /// `reinforce(activity)` — spec §4.5.
    pub fn reinforce(&mut self, activity: &[f32]) -> MycelResult<()> {
        if activity.len() != self.t_cap {
            return Err(MycelError::Validation("activity array length mismatch".into()));
        }
        let (t_cap, k, c) = (self.t_cap, self.k, self.c);
        for t in 0..t_cap {
            if !self.alive[t] || activity[t] <= 0.0 {
                continue;
            }
            let act = activity[t];
            for kk in 0..k {
                let nb = self.neigh_idx[t * k + kk];
                if nb < 0 {
                    continue;
                }
                for cc in 0..c {
                    let mood_c = self.mood[t * c + cc];
                    let factor = if mood_c != 0.0 { mood_c } else { 1.0 };
                    let idx = t * k * c + kk * c + cc;
                    self.pheromone[idx] = (self.pheromone[idx] + self.reinforce_gain[cc] * act * factor).max(0.0);
                }
            }
        }
        Ok(())
    }

    /// `diffuse_decay()` — spec §4.5.
    pub fn diffuse_decay(&mut self) {
        let (t_cap, k, c) = (self.t_cap, self.k, self.c);
        let prev = self.pheromone.clone();
        for t in 0..t_cap {
            for kk in 0..k {
                let nb = self.neigh_idx[t * k + kk];
                if nb < 0 {
                    continue;
                }
                let nb = nb as usize;
                let d = self.decay[t * k + kk];
                let f = self.diffu[t * k + kk];
                for cc in 0..c {
                    let mut mean_nb = 0.0f32;
                    let mut n_valid = 0usize;
                    for kk2 in 0..k {
                        let nb2 = self.neigh_idx[nb * k + kk2];
                        if nb2 < 0 {
                            continue;
                        }
                        let nb2 = nb2 as usize;
                        mean_nb += prev[nb * k * c + kk2 * c + cc];
                        let _ = nb2;
                        n_valid += 1;
                    }
                    let mean_nb = if n_valid > 0 { mean_nb / n_valid as f32 } else { 0.0 };
                    let idx = t * k * c + kk * c + cc;
                    let updated = prev[idx] * (1.0 - d) + f * (mean_nb - prev[idx]);
                    self.pheromone[idx] = updated.max(0.0);
                }
            }
        }
    }

    /// `nutrient(activity)` — spec §4.5.
    pub fn nutrient_step(&mut self, activity: &[f32]) -> MycelResult<()> {
        if activity.len() != self.t_cap {
            return Err(MycelError::Validation("activity array length mismatch".into()));
        }
        let recovery = self.nutrient_recovery;
        for t in 0..self.t_cap {
            self.nutrient[t] = (self.nutrient[t] + activity[t] - recovery * self.nutrient[t]).max(0.0);
        }
        Ok(())
    }

    /// `colony_update(iterations)` — spec §4.5: pick the neighbor label
    /// maximizing the sum of its pheromones, for `iterations` rounds.
    pub fn colony_update(&mut self, iterations: usize) {
        let (t_cap, k, c) = (self.t_cap, self.k, self.c);
        for _ in 0..iterations {
            let prev_colony = self.colony_id.clone();
            for t in 0..t_cap {
                if !self.alive[t] {
                    continue;
                }
                let mut best_score = -1.0f32;
                let mut best_label = prev_colony[t];
                for kk in 0..k {
                    let nb = self.neigh_idx[t * k + kk];
                    if nb < 0 {
                        continue;
                    }
                    let nb = nb as usize;
                    if !self.alive[nb] {
                        continue;
                    }
                    let score: f32 = (0..c).map(|cc| self.pheromone[t * k * c + kk * c + cc]).sum();
                    if score > best_score {
                        best_score = score;
                        best_label = prev_colony[nb];
                    }
                }
                self.colony_id[t] = best_label;
            }
        }
    }

    /// `subqg_feedback(kappa_n, kappa_mood)` — spec §4.5.
    pub fn subqg_feedback(&mut self) {
        let c = self.c;
        let kappa_mood = self.kappa_mood.clone();
        let kappa_nutrient = self.kappa_nutrient;
        for t in 0..self.t_cap {
            if !self.alive[t] {
                continue;
            }
            let mood_term: f32 = (0..c).map(|cc| kappa_mood[cc] * self.mood[t * c + cc]).sum();
            self.subqg_field[t] = kappa_nutrient * self.nutrient[t] + mood_term;
        }
    }

    /// `potential_for_hpio(weights)` — spec §4.5.
    pub fn potential_for_hpio(&mut self, weights: &[f32]) -> MycelResult<()> {
        if weights.len() != self.c {
            return Err(MycelError::Validation("weights length must equal channel count".into()));
        }
        let (t_cap, k, c) = (self.t_cap, self.k, self.c);
        for t in 0..t_cap {
            if !self.alive[t] {
                continue;
            }
            let mut acc = 0.0f32;
            for kk in 0..k {
                let nb = self.neigh_idx[t * k + kk];
                if nb < 0 {
                    continue;
                }
                let nb = nb as usize;
                for (cc, &w) in weights.iter().enumerate() {
                    let pher_nb0 = self.pheromone[nb * k * c + 0 * c + cc];
                    let pher_t_k = self.pheromone[t * k * c + kk * c + cc];
                    acc += w * (pher_nb0 - pher_t_k);
                }
            }
            self.potential[t] = acc;
        }
        Ok(())
    }

    /// `reproduction(activity, prototypes, e)` — spec §4.5. Host-side,
    /// pops free slots, splits nutrient, mutates mood/prototypes, copies
    /// colony id, zeroes new edges. `prototypes` is a flattened
    /// `[t_cap * proto_dim]` array mutated in place.
    pub fn reproduction(
        &mut self,
        activity: &[f32],
        prototypes: &mut [f32],
        proto_dim: usize,
        rng: &mut impl Rng,
    ) -> MycelResult<usize> {
        if activity.len() != self.t_cap {
            return Err(MycelError::Validation("activity array length mismatch".into()));
        }
        if prototypes.len() != self.t_cap * proto_dim {
            return Err(MycelError::Validation("prototypes array length mismatch".into()));
        }
        let normal = Normal::new(0.0f32, 1.0f32).expect("unit normal is always valid");
        let mut spawned = 0usize;
        let (c, k) = (self.c, self.k);
        let sigma = self.repro.mutation_sigma;

        for parent in 0..self.t_cap {
            if !self.alive[parent] {
                continue;
            }
            if self.nutrient[parent] < self.repro.threshold_nutrient {
                continue;
            }
            if activity[parent] < self.repro.threshold_activity {
                continue;
            }
            if self.free_head == 0 {
                break;
            }
            self.free_head -= 1;
            let child = self.free_list[self.free_head];

            let split = self.nutrient[parent] * 0.5;
            self.nutrient[parent] = split;
            self.nutrient[child] = split;

            self.alive[child] = true;
            self.colony_id[child] = self.colony_id[parent];

            for cc in 0..c {
                let mutated = self.mood[parent * c + cc] + sigma * normal.sample(rng);
                self.mood[child * c + cc] = mutated;
            }
            for kk in 0..k {
                self.neigh_idx[child * k + kk] = -1;
                for cc in 0..c {
                    self.pheromone[child * k * c + kk * c + cc] = 0.0;
                }
                self.decay[child * k + kk] = self.decay_default;
                self.diffu[child * k + kk] = self.diffu_default;
            }

            for d in 0..proto_dim {
                let parent_val = prototypes[parent * proto_dim + d];
                prototypes[child * proto_dim + d] = parent_val + sigma * normal.sample(rng);
            }

            spawned += 1;
        }

        if spawned > 0 {
            self.t_act = 1 + (0..self.t_cap).rev().find(|&i| self.alive[i]).unwrap_or(0);
        }
        Ok(spawned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn grid_neighbors(t_cap: usize, k: usize) -> Vec<i32> {
        // minimal ring topology for deterministic tests
        let mut idx = vec![-1i32; t_cap * k];
        for t in 0..t_cap {
            idx[t * k] = ((t + 1) % t_cap) as i32;
            if k > 1 {
                idx[t * k + 1] = ((t + t_cap - 1) % t_cap) as i32;
            }
        }
        idx
    }

    #[test]
    fn reinforce_minimal_scenario_matches_spec() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = MycelState::init(4, 3, 2, 4, &mut rng).unwrap();
        state.pheromone.fill(0.0);
        state.set_neighbors_sparse(vec![1, 2, 0, 3, 0, 3, 1, 2]).unwrap();
        state.set_pheromone_gains(vec![1.0, 1.0, 1.0]).unwrap();
        state.mood.fill(0.0);
        let activity = [1.0, 0.0, 0.0, 0.0];
        state.reinforce(&activity).unwrap();

        for cc in 0..3 {
            assert!((state.pheromone[0 * 2 * 3 + 0 * 3 + cc] - 1.0).abs() < 1e-6);
            assert!((state.pheromone[0 * 2 * 3 + 1 * 3 + cc] - 1.0).abs() < 1e-6);
        }
        for t in 1..4 {
            for idx in 0..(2 * 3) {
                assert_eq!(state.pheromone[t * 2 * 3 + idx], 0.0);
            }
        }
    }

    #[test]
    fn pheromone_stays_nonnegative_after_reinforce_and_diffuse() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = MycelState::init(8, 2, 3, 8, &mut rng).unwrap();
        let neigh = grid_neighbors(8, 3);
        state.set_neighbors_sparse(neigh).unwrap();
        let activity: Vec<f32> = (0..8).map(|i| if i % 2 == 0 { 0.3 } else { -0.1 }).collect();
        state.reinforce(&activity).unwrap();
        state.diffuse_decay();
        assert!(state.pheromone.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn alive_free_list_bijection_holds_after_init_and_reproduction() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = MycelState::init(6, 2, 2, 2, &mut rng).unwrap();
        assert!(state.check_alive_free_bijection());
        let neigh = grid_neighbors(6, 2);
        state.set_neighbors_sparse(neigh).unwrap();
        state.nutrient[0] = 10.0;
        state.set_repro_params(1.0, 0.1, 0.05);
        let activity = vec![1.0; 6];
        let mut prototypes = vec![0.0f32; 6 * 4];
        let spawned = state.reproduction(&activity, &mut prototypes, 4, &mut rng).unwrap();
        assert!(spawned > 0);
        assert!(state.check_alive_free_bijection());
    }

    #[test]
    fn colony_update_converges_on_dense_grid() {
        let mut rng = StdRng::seed_from_u64(4);
        let t_cap = 9;
        let k = 4;
        let mut state = MycelState::init(t_cap, 1, k, t_cap, &mut rng).unwrap();
        // 3x3 grid, 4-neighbor (with wraparound-free clamping via -1 edges)
        let w = 3usize;
        let mut neigh = vec![-1i32; t_cap * k];
        for t in 0..t_cap {
            let x = t % w;
            let y = t / w;
            let mut slot = 0;
            if x > 0 { neigh[t * k + slot] = (y * w + x - 1) as i32; slot += 1; }
            if x < w - 1 { neigh[t * k + slot] = (y * w + x + 1) as i32; slot += 1; }
            if y > 0 { neigh[t * k + slot] = ((y - 1) * w + x) as i32; slot += 1; }
            if y < w - 1 { neigh[t * k + slot] = ((y + 1) * w + x) as i32; }
        }
        state.set_neighbors_sparse(neigh).unwrap();
        for t in 0..t_cap {
            state.colony_id[t] = (t + 1) as u8;
        }
        // Give cell 0's edges a strong pheromone so its label dominates.
        for idx in 0..(t_cap * k) {
            state.pheromone[idx] = 0.01;
        }
        for kk in 0..k {
            state.pheromone[0 * k + kk] = 5.0;
        }
        state.colony_update(20);
        // at least some propagation happened: not all labels are distinct anymore
        let distinct: std::collections::HashSet<u8> = state.colony_id.iter().copied().collect();
        assert!(distinct.len() < t_cap);
    }
}
