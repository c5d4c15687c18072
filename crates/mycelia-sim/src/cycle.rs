//! Autonomous cycle orchestrator — spec §4.8.
//!
//! Binds the SubQG substrate, mycel graph, agent population, and brain
//! layer into the fixed 8-step per-cycle order, with the supplemental
//! `Idle/Running/Finishing` state machine called out in the Design Notes.
//! A real device orchestrator pre-binds kernel arguments once and leaves
//! them bound across cycles; this host mirror has no kernel arguments to
//! bind, but keeps the same state machine and finish cadence so the two
//! stay conceptually aligned.

use mycelia_core::config::CYCLE_FINISH_INTERVAL;
use mycelia_core::MycelResult;

use crate::agent::{field, AgentPopulation, AgentSensedField};
use crate::brain::BrainState;
use crate::mycel::MycelState;
use crate::subqg::SubQGState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
    Finishing,
}

pub struct AutonomousCycle {
    pub state: CycleState,
    pub cycle_count: u64,
    pub finish_interval: u64,
    pub blocking: bool,
}

impl AutonomousCycle {
    pub fn new(blocking: bool) -> Self {
        Self {
            state: CycleState::Idle,
            cycle_count: 0,
            finish_interval: CYCLE_FINISH_INTERVAL as u64,
            blocking,
        }
    }

    /// Whether this cycle boundary requires a full device finish under the
    /// B=5 cadence (spec §4.8 / §5): every `finish_interval` cycles in
    /// blocking mode, or always in non-blocking-disabled testing mode.
    fn due_for_finish(&self) -> bool {
        !self.blocking || self.cycle_count % self.finish_interval == 0
    }

    /// Runs one full autonomous cycle across all layers, in the fixed
    /// 8-step order. Returns `Ok(true)` if the cycle completed, `Ok(false)`
    /// if the abort flag fired mid-cycle (partial progress is kept,
    /// further state is left untouched per spec §5's cancellation policy).
    #[allow(clippy::too_many_arguments)]
    pub fn run_cycle(
        &mut self,
        subqg: &mut SubQGState,
        brain: &mut BrainState,
        agents: &mut AgentPopulation,
        mycel: &mut MycelState,
        reward_scale: f32,
        lr_hebbian: f32,
        adam_t: u32,
        adam_lr: f32,
        sensory_gain: f32,
        dt: f32,
        mut should_abort: impl FnMut() -> bool,
    ) -> MycelResult<bool> {
        self.state = CycleState::Running;

        // 1. SubQG step.
        subqg.step(None, true)?;
        if should_abort() {
            self.state = CycleState::Idle;
            return Ok(false);
        }

        // 2. Brain bridge.
        brain.bridge_cycle(&subqg.energy, &subqg.phase, &mut mycel.nutrient, sensory_gain, 1.0);

        // 3. Izhikevich step.
        brain.izhikevich_step(dt, 30.0);
        if should_abort() {
            self.state = CycleState::Idle;
            return Ok(false);
        }

        // 4. Agent policy kernel; swap in/out at the end of this step.
        let w = subqg.w;
        let h = subqg.h;
        agents.update_policy(
            w,
            h,
            |x, y| {
                let idx = y * w + x;
                AgentSensedField {
                    energy: subqg.energy[idx],
                    temperature: subqg.temperature[idx],
                    potential: subqg.potential[idx],
                    drift_x: subqg.drift_x[idx],
                    drift_y: subqg.drift_y[idx],
                }
            },
            reward_scale,
            Some(&mycel.colony_id),
        )?;
        agents.swap();

        // 5. Adam update over agent parameters.
        agents.adam_update(adam_t, adam_lr, 0.9, 0.999, 1e-8, 0.0);
        if should_abort() {
            self.state = CycleState::Idle;
            return Ok(false);
        }

        // 6. Social Hebbian (chunked, abort-checked internally).
        let hebbian_ok = brain.social_hebbian(
            lr_hebbian,
            mycelia_core::config::DEFAULT_HEBBIAN_CHUNK_ROWS,
            mycelia_core::config::DEFAULT_HEBBIAN_MAX_BYTES,
            &mut should_abort,
        )?;
        if !hebbian_ok || should_abort() {
            self.state = CycleState::Idle;
            return Ok(false);
        }

        // 7. Mycel reinforce.
        let activity: Vec<f32> = agents
            .in_buf()
            .chunks(agents.stride)
            .map(|a| a[field::REWARD].max(0.0))
            .collect();
        mycel.reinforce(&activity)?;

        // 8. Mycel diffuse/decay.
        mycel.diffuse_decay();

        self.cycle_count += 1;
        self.state = if self.due_for_finish() {
            CycleState::Finishing
        } else {
            CycleState::Running
        };
        if self.state == CycleState::Finishing {
            self.state = CycleState::Idle;
        }

        Ok(true)
    }

    /// Colony relabel, run exactly once after the autonomous loop exits
    /// (spec §4.8).
    pub fn relabel_colonies(&self, mycel: &mut MycelState, iterations: usize) {
        mycel.colony_update(iterations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny_rig() -> (SubQGState, BrainState, AgentPopulation, MycelState) {
        let subqg = SubQGState::new(2, 2, 0.01, 0.5, true, 7).unwrap();
        let brain = BrainState::new(4);
        let mut agents = AgentPopulation::new(4, crate::agent::AGENT_STRIDE).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        agents.seed_policy_gaussian(0.05, &mut rng);
        let mut mycel = MycelState::init(4, 2, 2, 4, &mut rng).unwrap();
        mycel.set_neighbors_sparse(vec![1, 2, 2, 3, 3, 0, 0, 1]).unwrap();
        (subqg, brain, agents, mycel)
    }

    #[test]
    fn full_cycle_runs_all_eight_steps_without_aborting() {
        let (mut subqg, mut brain, mut agents, mut mycel) = tiny_rig();
        let mut cycle = AutonomousCycle::new(true);
        let completed = cycle
            .run_cycle(&mut subqg, &mut brain, &mut agents, &mut mycel, 1.0, 0.01, 1, 0.01, 1.0, 1.0, || false)
            .unwrap();
        assert!(completed);
        assert_eq!(cycle.cycle_count, 1);
    }

    #[test]
    fn abort_flag_stops_cycle_with_partial_progress_reported() {
        let (mut subqg, mut brain, mut agents, mut mycel) = tiny_rig();
        let mut cycle = AutonomousCycle::new(true);
        let mut calls = 0;
        let completed = cycle
            .run_cycle(&mut subqg, &mut brain, &mut agents, &mut mycel, 1.0, 0.01, 1, 0.01, 1.0, 1.0, || {
                calls += 1;
                calls > 1
            })
            .unwrap();
        assert!(!completed);
        assert_eq!(cycle.state, CycleState::Idle);
    }

    #[test]
    fn finish_cadence_triggers_every_b_cycles() {
        let (mut subqg, mut brain, mut agents, mut mycel) = tiny_rig();
        let mut cycle = AutonomousCycle::new(true);
        cycle.finish_interval = 2;
        for _ in 0..4 {
            cycle
                .run_cycle(&mut subqg, &mut brain, &mut agents, &mut mycel, 1.0, 0.01, 1, 0.01, 1.0, 1.0, || false)
                .unwrap();
        }
        assert_eq!(cycle.cycle_count, 4);
    }
}
