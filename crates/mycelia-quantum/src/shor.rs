//! Period-finding circuit backing `execute_shor_gpu` — spec §4.9 / §6.

use mycelia_core::{MycelError, MycelResult};

use crate::gates::{apply_single, inverse_qft, modular_exponentiation, pauli_x, hadamard};
use crate::state::QuantumState;

/// Builds the counting + target registers, puts the counting register in
/// superposition, applies the modular-exponentiation permutation
/// conditioned on it, then runs the inverse QFT over the counting
/// register (spec §4.9).
pub fn run_period_finding(counting_qubits: u32, target_qubits: u32, a: u64, n_mod: u64) -> MycelResult<QuantumState> {
    if n_mod < 2 {
        return Err(MycelError::Validation("modulus must be >= 2".into()));
    }
    let total = counting_qubits + target_qubits;
    let mut state = QuantumState::zero(total)?;

    for q in 0..counting_qubits {
        apply_single(&mut state, q, hadamard())?;
    }
    // Target register starts at |1>: set its least-significant qubit.
    apply_single(&mut state, counting_qubits, pauli_x())?;

    modular_exponentiation(&mut state, 0..counting_qubits, counting_qubits..total, a, n_mod)?;
    inverse_qft(&mut state, 0..counting_qubits)?;
    Ok(state)
}

/// Classical continued-fraction post-processing: recovers a candidate
/// period from a measured counting-register value by walking the
/// continued-fraction convergents of `measured / 2^counting_qubits` and
/// returning the largest denominator still below `n_mod`.
pub fn continued_fraction_period(measured: u64, counting_qubits: u32, n_mod: u64) -> Option<u64> {
    if measured == 0 {
        return None;
    }
    let denom_bound = 1u64 << counting_qubits;

    let a0 = measured / denom_bound;
    let (mut h_prev, mut h_cur) = (1u64, a0);
    let (mut k_prev, mut k_cur) = (0u64, 1u64);
    let mut best = if k_cur < n_mod { Some(k_cur) } else { None };

    let (mut num, mut den) = (denom_bound, measured - a0 * denom_bound);
    while den != 0 {
        let a = num / den;
        let new_den = num - a * den;
        num = den;
        den = new_den;

        let h_next = a.wrapping_mul(h_cur).wrapping_add(h_prev);
        let k_next = a.wrapping_mul(k_cur).wrapping_add(k_prev);
        h_prev = h_cur;
        h_cur = h_next;
        k_prev = k_cur;
        k_cur = k_next;

        if k_cur < n_mod {
            best = Some(k_cur);
        } else {
            break;
        }
    }

    best.filter(|&k| k > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_finding_preserves_norm() {
        let state = run_period_finding(4, 3, 7, 15).unwrap();
        assert!(state.check_norm1(1e-3));
    }

    #[test]
    fn rejects_degenerate_modulus() {
        assert!(run_period_finding(4, 3, 2, 1).is_err());
    }

    #[test]
    fn continued_fraction_recovers_small_period() {
        // a=7, N=15 has true order 4: measured phase ~ k/4 * 2^counting.
        let counting_qubits = 8u32;
        let denom = 1u64 << counting_qubits;
        let measured = denom / 4; // exact phase for k=1, r=4
        let period = continued_fraction_period(measured, counting_qubits, 15);
        assert_eq!(period, Some(4));
    }
}
