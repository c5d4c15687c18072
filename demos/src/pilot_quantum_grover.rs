//! Grover Search Pilot
//!
//! Marks a single basis state in an 8-qubit register and runs the
//! standard `floor(pi/4 * sqrt(N))` number of oracle+diffusion rounds,
//! reporting how the marked state's probability climbs each round.
//!
//! Run in release mode:
//! ```bash
//! cargo run --release -p mycelia-demos --bin pilot-quantum-grover
//! ```

use anyhow::Result;

use mycelia_quantum::grover::run_grover;

const NUM_QUBITS: u32 = 8;
const MARKED: usize = 0b1010_1100;

fn main() -> Result<()> {
    let n = 1usize << NUM_QUBITS;
    let optimal_rounds = ((std::f64::consts::FRAC_PI_4) * (n as f64).sqrt()).floor() as u32;

    println!("round,probability");
    for rounds in 0..=optimal_rounds + 2 {
        let result = run_grover(NUM_QUBITS, rounds, n as usize - 1, MARKED)?;
        println!("{rounds},{:.4}", result.probability);
    }

    let best = run_grover(NUM_QUBITS, optimal_rounds, n as usize - 1, MARKED)?;
    println!(
        "optimal round count {optimal_rounds}: most probable state {:#010b} (p={:.4})",
        best.most_probable, best.probability
    );
    Ok(())
}
