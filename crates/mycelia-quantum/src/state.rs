//! Dense complex state-vector buffer — spec §4.9.

use mycelia_core::{MycelError, MycelResult};
use num_complex::Complex32;

/// Maximum qubit count a process is willing to allocate a dense state
/// vector for (`2^26` amplitudes ~ 1 GiB of `Complex32`).
pub const MAX_QUBITS: u32 = 26;

#[derive(Clone)]
pub struct QuantumState {
    pub num_qubits: u32,
    pub amps: Vec<Complex32>,
}

impl QuantumState {
    /// Allocate `dim = 2^num_qubits` amplitudes, initialized to `|0...0>`.
    pub fn zero(num_qubits: u32) -> MycelResult<Self> {
        if num_qubits == 0 || num_qubits > MAX_QUBITS {
            return Err(MycelError::Validation(format!(
                "num_qubits must be in [1, {MAX_QUBITS}], got {num_qubits}"
            )));
        }
        let dim = 1usize << num_qubits;
        let mut amps = vec![Complex32::new(0.0, 0.0); dim];
        amps[0] = Complex32::new(1.0, 0.0);
        Ok(Self { num_qubits, amps })
    }

    pub fn dim(&self) -> usize {
        self.amps.len()
    }

    pub fn norm_sq(&self) -> f32 {
        self.amps.iter().map(|a| a.norm_sqr()).sum()
    }

    /// `quantum_check_norm1`: debug-only assertion helper (spec §8).
    pub fn check_norm1(&self, eps: f32) -> bool {
        (1.0 - self.norm_sq()).abs() < eps
    }

    pub fn probabilities(&self) -> Vec<f32> {
        self.amps.iter().map(|a| a.norm_sqr()).collect()
    }

    /// Pauli-Z expectation over the qubits selected by `mask`:
    /// `sign = (popcount(idx & mask) & 1) ? -1 : 1`, accumulated over
    /// `sign * |amp|^2` (spec §4.9).
    pub fn pauli_z_expectation(&self, mask: u64) -> f32 {
        self.amps
            .iter()
            .enumerate()
            .map(|(idx, a)| {
                let sign = if ((idx as u64 & mask).count_ones() & 1) == 1 {
                    -1.0
                } else {
                    1.0
                };
                sign * a.norm_sqr()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_state_has_unit_norm_and_all_amplitude_on_ground_state() {
        let s = QuantumState::zero(3).unwrap();
        assert_eq!(s.dim(), 8);
        assert!(s.check_norm1(1e-6));
        assert_eq!(s.amps[0], Complex32::new(1.0, 0.0));
    }

    #[test]
    fn rejects_qubit_counts_outside_range() {
        assert!(QuantumState::zero(0).is_err());
        assert!(QuantumState::zero(MAX_QUBITS + 1).is_err());
    }

    #[test]
    fn pauli_z_expectation_of_ground_state_is_plus_one() {
        let s = QuantumState::zero(2).unwrap();
        assert!((s.pauli_z_expectation(0b11) - 1.0).abs() < 1e-6);
    }
}
