//! Autonomous Mycel/Agent Cycle Pilot
//!
//! Runs the fixed 8-step autonomous cycle (SubQG -> brain bridge ->
//! Izhikevich -> agent policy -> Adam -> Hebbian -> mycel reinforce ->
//! diffuse/decay) for a fixed tick count and reports the population's
//! mean reward and the mycel colony's alive fraction at each checkpoint.
//!
//! Run in release mode:
//! ```bash
//! cargo run --release -p mycelia-demos --bin pilot-autonomous-cycle
//! ```

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mycelia_sim::agent::{field, AgentPopulation, AGENT_STRIDE};
use mycelia_sim::brain::BrainState;
use mycelia_sim::cycle::AutonomousCycle;
use mycelia_sim::mycel::MycelState;
use mycelia_sim::subqg::SubQGState;

const GRID_W: usize = 32;
const GRID_H: usize = 32;
const AGENT_COUNT: usize = 64;
const TICKS: u64 = 200;
const CHECKPOINT_EVERY: u64 = 25;

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);

    let mut subqg = SubQGState::new(GRID_W, GRID_H, 0.05, 0.5, false, 7).context("subqg init")?;
    let mut mycel = MycelState::init(GRID_W * GRID_H, 3, 6, GRID_W * GRID_H, &mut rng).context("mycel init")?;
    let mut agents = AgentPopulation::new(AGENT_COUNT, AGENT_STRIDE).context("agent init")?;
    let mut brain = BrainState::new(AGENT_COUNT);
    let mut cycle = AutonomousCycle::new(true);

    println!("tick,mean_reward,alive_cells,free_count");
    for tick in 1..=TICKS {
        let completed = cycle.run_cycle(&mut subqg, &mut brain, &mut agents, &mut mycel, 1.0, 0.01, tick as u32, 1e-3, 1.0, 1.0, || false)?;
        if !completed {
            println!("cycle aborted at tick {tick}");
            break;
        }
        if tick % CHECKPOINT_EVERY == 0 {
            let mean_reward: f32 = agents.in_buf().chunks(agents.stride).map(|a| a[field::REWARD]).sum::<f32>() / AGENT_COUNT as f32;
            println!("{tick},{mean_reward:.4},{},{}", mycel.alive_count(), mycel.free_count());
        }
    }

    cycle.relabel_colonies(&mut mycel, 4);
    println!("final colony relabel pass complete");
    Ok(())
}
