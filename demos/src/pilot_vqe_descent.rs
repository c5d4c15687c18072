//! VQE Gradient Descent Pilot
//!
//! Minimizes a 3-qubit transverse-field-style Hamiltonian (single-qubit
//! Z terms plus a ZZ coupling) via parameter-shift gradients and plain
//! gradient descent, printing the energy trajectory.
//!
//! Run in release mode:
//! ```bash
//! cargo run --release -p mycelia-demos --bin pilot-vqe-descent
//! ```

use anyhow::Result;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use mycelia_quantum::vqe::{energy, parameter_shift_gradients, PauliZTerm};

const NUM_QUBITS: u32 = 3;
const LAYERS: u32 = 2;
const STEPS: usize = 60;
const LEARNING_RATE: f32 = 0.2;

fn main() -> Result<()> {
    let hamiltonian = vec![
        PauliZTerm { coeff: 1.0, mask: 0b001 },
        PauliZTerm { coeff: 1.0, mask: 0b010 },
        PauliZTerm { coeff: 1.0, mask: 0b100 },
        PauliZTerm { coeff: 0.5, mask: 0b011 },
    ];

    let mut rng = StdRng::seed_from_u64(3);
    let param_len = (LAYERS * NUM_QUBITS * 2) as usize;
    let mut params: Vec<f32> = (0..param_len).map(|_| rng.gen_range(-0.1..0.1)).collect();

    println!("step,energy");
    for step in 0..STEPS {
        let e = energy(NUM_QUBITS, LAYERS, &params, &hamiltonian)?;
        println!("{step},{e:.5}");
        let grads = parameter_shift_gradients(NUM_QUBITS, LAYERS, &params, &hamiltonian)?;
        for (p, g) in params.iter_mut().zip(grads.iter()) {
            *p -= LEARNING_RATE * g;
        }
    }

    let final_energy = energy(NUM_QUBITS, LAYERS, &params, &hamiltonian)?;
    println!("final energy: {final_energy:.5}");
    Ok(())
}
