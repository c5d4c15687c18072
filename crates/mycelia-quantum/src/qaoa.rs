//! QAOA cost/mixer layers — spec §4.9 "symbolic qualia kernels" family.

use mycelia_core::{MycelError, MycelResult};
use num_complex::Complex32;

use crate::gates::{apply_single, hadamard, rx};
use crate::state::QuantumState;
use crate::vqe::{hamiltonian_expectation, PauliZTerm};

/// Diagonal cost unitary `exp(-i*gamma*coeff*Z_mask)`: phase-only, no
/// amplitude mixing, so it is applied directly to the amplitude array.
pub fn apply_cost_unitary(state: &mut QuantumState, terms: &[PauliZTerm], gamma: f32) {
    for (idx, amp) in state.amps.iter_mut().enumerate() {
        let mut phase = 0.0f32;
        for t in terms {
            let sign = if ((idx as u64 & t.mask).count_ones() & 1) == 1 { -1.0 } else { 1.0 };
            phase += t.coeff * sign;
        }
        *amp = *amp * Complex32::from_polar(1.0, -gamma * phase);
    }
}

/// Mixer unitary: `RX(2*beta)` on every qubit.
pub fn apply_mixer_unitary(state: &mut QuantumState, beta: f32) -> MycelResult<()> {
    for q in 0..state.num_qubits {
        apply_single(state, q, rx(2.0 * beta))?;
    }
    Ok(())
}

/// Runs `p = gammas.len()` QAOA layers starting from `H^⊗n |0...0>`.
pub fn run_qaoa(num_qubits: u32, gammas: &[f32], betas: &[f32], cost: &[PauliZTerm]) -> MycelResult<QuantumState> {
    if gammas.len() != betas.len() {
        return Err(MycelError::Validation("gammas and betas must have equal length".into()));
    }
    let mut state = QuantumState::zero(num_qubits)?;
    for q in 0..num_qubits {
        apply_single(&mut state, q, hadamard())?;
    }
    for (&gamma, &beta) in gammas.iter().zip(betas) {
        apply_cost_unitary(&mut state, cost, gamma);
        apply_mixer_unitary(&mut state, beta)?;
    }
    Ok(state)
}

pub fn cost_expectation(state: &QuantumState, cost: &[PauliZTerm]) -> f32 {
    hamiltonian_expectation(state, cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qaoa_run_preserves_norm() {
        let cost = vec![PauliZTerm { coeff: 1.0, mask: 0b11 }];
        let state = run_qaoa(2, &[0.3, 0.1], &[0.2, 0.4], &cost).unwrap();
        assert!(state.check_norm1(1e-4));
    }

    #[test]
    fn mismatched_gamma_beta_lengths_are_rejected() {
        let cost = vec![PauliZTerm { coeff: 1.0, mask: 0b11 }];
        assert!(run_qaoa(2, &[0.1, 0.2], &[0.1], &cost).is_err());
    }
}
