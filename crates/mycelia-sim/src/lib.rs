pub mod agent;
pub mod brain;
pub mod cycle;
pub mod mycel;
pub mod persist;
pub mod rng;
pub mod subqg;

pub use agent::{AgentPopulation, AgentSensedField};
pub use brain::BrainState;
pub use cycle::{AutonomousCycle, CycleState};
pub use mycel::{MycelState, ReproParams};
pub use rng::SplitMix64;
pub use subqg::{FieldSnapshot, SubQGState};
