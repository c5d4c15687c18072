//! Grover search — spec §4.9 / §8 scenario 4.

use mycelia_core::MycelResult;

use crate::gates::{apply_single, grover_diffusion, grover_oracle, hadamard};
use crate::state::QuantumState;

pub struct GroverResult {
    pub most_probable: usize,
    pub probability: f32,
}

/// Runs Grover's algorithm over `num_qubits`, marking basis states with
/// `(idx & mask) == value`, for `iterations` oracle+diffusion rounds.
pub fn run_grover(num_qubits: u32, iterations: u32, mask: usize, value: usize) -> MycelResult<GroverResult> {
    let mut state = QuantumState::zero(num_qubits)?;
    for q in 0..num_qubits {
        apply_single(&mut state, q, hadamard())?;
    }
    for _ in 0..iterations {
        grover_oracle(&mut state, mask, value);
        grover_diffusion(&mut state)?;
    }

    let probs = state.probabilities();
    let (most_probable, &probability) = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, p)| (i, p))
        .unwrap();
    Ok(GroverResult { most_probable, probability })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_qubit_grover_finds_marked_state_with_high_probability() {
        let result = run_grover(5, 4, 0x1F, 0b10110).unwrap();
        assert_eq!(result.most_probable, 0b10110);
        assert!(result.probability > 0.95);
    }
}
