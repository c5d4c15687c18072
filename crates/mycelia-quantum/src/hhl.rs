//! HHL bootstrap — spec §4.9 / §6 (`execute_hhl_gpu`).
//!
//! A full HHL pipeline needs quantum phase estimation to discover the
//! eigenvalues of the system matrix; this bootstrap assumes the caller
//! already knows (or has classically estimated) the eigenvalues of the
//! diagonalized system and skips straight to the conditional-rotation
//! step that encodes `x ~ sum_i (b_i / lambda_i) |i>` onto an ancilla
//! qubit's `|1>` branch — the part of HHL actually exercised by the
//! driver's demo kernels.

use mycelia_core::{MycelError, MycelResult};
use num_complex::Complex32;

use crate::state::QuantumState;

/// Runs the conditional-rotation bootstrap: `work_qubits = log2(eigenvalues.len())`,
/// plus one ancilla qubit appended as the most significant qubit.
/// `b_vector` must already be normalized in the eigenbasis.
pub fn run_hhl_bootstrap(b_vector: &[Complex32], eigenvalues: &[f32], c_const: f32) -> MycelResult<QuantumState> {
    if b_vector.len() != eigenvalues.len() {
        return Err(MycelError::Validation("b_vector and eigenvalues must have equal length".into()));
    }
    if !b_vector.len().is_power_of_two() {
        return Err(MycelError::Validation("b_vector length must be a power of two".into()));
    }
    let work_dim = b_vector.len();
    let work_qubits = work_dim.trailing_zeros();
    let total_qubits = work_qubits + 1;
    let mut state = QuantumState::zero(total_qubits)?;
    state.amps.iter_mut().for_each(|a| *a = Complex32::new(0.0, 0.0));

    for (i, &b_i) in b_vector.iter().enumerate() {
        let lambda = eigenvalues[i];
        let ratio = if lambda.abs() < 1e-9 { 0.0 } else { (c_const / lambda).clamp(-1.0, 1.0) };
        let angle = 2.0 * ratio.asin();
        let (half_sin, half_cos) = (angle / 2.0).sin_cos();
        state.amps[i] = b_i * half_cos; // ancilla = 0 branch
        state.amps[work_dim + i] = b_i * half_sin; // ancilla = 1 branch
    }
    Ok(state)
}

/// Extracts the (unnormalized) solution vector from the ancilla `|1>`
/// branch, i.e. post-measurement-success amplitudes.
pub fn extract_solution_branch(state: &QuantumState, work_qubits: u32) -> Vec<Complex32> {
    let work_dim = 1usize << work_qubits;
    state.amps[work_dim..2 * work_dim].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_preserves_norm_and_splits_by_branch() {
        let b = vec![Complex32::new(0.6, 0.0), Complex32::new(0.8, 0.0)];
        let eigen = vec![1.0, 2.0];
        let state = run_hhl_bootstrap(&b, &eigen, 0.5).unwrap();
        assert!(state.check_norm1(1e-4));
        let solution = extract_solution_branch(&state, 1);
        assert_eq!(solution.len(), 2);
    }

    #[test]
    fn rejects_non_power_of_two_length() {
        let b = vec![Complex32::new(1.0, 0.0); 3];
        let eigen = vec![1.0, 2.0, 3.0];
        assert!(run_hhl_bootstrap(&b, &eigen, 0.1).is_err());
    }
}
