//! Gate application rules — spec §4.9.
//!
//! Each function below mirrors the indexing contract a real kernel launch
//! would use (`stride = 1 << target`, `index0`/`index1` pairs), just
//! walked on the host instead of across work-items.

use mycelia_core::{MycelError, MycelResult};
use num_complex::Complex32;

use crate::state::QuantumState;

pub type Mat2 = [[Complex32; 2]; 2];

fn c(re: f32, im: f32) -> Complex32 {
    Complex32::new(re, im)
}

pub fn pauli_x() -> Mat2 {
    [[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]]
}

pub fn pauli_y() -> Mat2 {
    [[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]]
}

pub fn pauli_z() -> Mat2 {
    [[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]]
}

pub fn hadamard() -> Mat2 {
    let s = std::f32::consts::FRAC_1_SQRT_2;
    [[c(s, 0.0), c(s, 0.0)], [c(s, 0.0), c(-s, 0.0)]]
}

pub fn rx(theta: f32) -> Mat2 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    [
        [c(half_cos, 0.0), c(0.0, -half_sin)],
        [c(0.0, -half_sin), c(half_cos, 0.0)],
    ]
}

pub fn ry(theta: f32) -> Mat2 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    [
        [c(half_cos, 0.0), c(-half_sin, 0.0)],
        [c(half_sin, 0.0), c(half_cos, 0.0)],
    ]
}

pub fn rz(theta: f32) -> Mat2 {
    let half = theta / 2.0;
    [
        [Complex32::from_polar(1.0, -half), c(0.0, 0.0)],
        [c(0.0, 0.0), Complex32::from_polar(1.0, half)],
    ]
}

fn check_target(state: &QuantumState, target: u32) -> MycelResult<()> {
    if target >= state.num_qubits {
        return Err(MycelError::Validation(format!(
            "target qubit {target} out of range for {}-qubit state",
            state.num_qubits
        )));
    }
    Ok(())
}

/// 1-qubit gate on `target`: launch contract is `2^(n-1)` work items, each
/// touching `(base, base+stride)` with `stride = 1 << target`.
pub fn apply_single(state: &mut QuantumState, target: u32, m: Mat2) -> MycelResult<()> {
    check_target(state, target)?;
    let stride = 1usize << target;
    let dim = state.dim();
    let mut blk = 0;
    while blk * (2 * stride) < dim {
        for off in 0..stride {
            let i0 = blk * (2 * stride) + off;
            let i1 = i0 + stride;
            let a0 = state.amps[i0];
            let a1 = state.amps[i1];
            state.amps[i0] = m[0][0] * a0 + m[0][1] * a1;
            state.amps[i1] = m[1][0] * a0 + m[1][1] * a1;
        }
        blk += 1;
    }
    Ok(())
}

/// Controlled single-qubit gate: only pair-indices with `control` bit set
/// are touched (spec §4.9).
pub fn apply_controlled(state: &mut QuantumState, control: u32, target: u32, m: Mat2) -> MycelResult<()> {
    check_target(state, target)?;
    check_target(state, control)?;
    if control == target {
        return Err(MycelError::Validation("control and target qubits must differ".into()));
    }
    let stride = 1usize << target;
    let control_mask = 1usize << control;
    let dim = state.dim();
    let mut blk = 0;
    while blk * (2 * stride) < dim {
        for off in 0..stride {
            let i0 = blk * (2 * stride) + off;
            let i1 = i0 + stride;
            if i0 & control_mask == 0 {
                continue;
            }
            let a0 = state.amps[i0];
            let a1 = state.amps[i1];
            state.amps[i0] = m[0][0] * a0 + m[0][1] * a1;
            state.amps[i1] = m[1][0] * a0 + m[1][1] * a1;
        }
        blk += 1;
    }
    Ok(())
}

pub fn cnot(state: &mut QuantumState, control: u32, target: u32) -> MycelResult<()> {
    apply_controlled(state, control, target, pauli_x())
}

/// Controlled-phase: multiplies the amplitude by `e^{i*theta}` wherever
/// both `control` and `target` bits are 1.
pub fn controlled_phase(state: &mut QuantumState, control: u32, target: u32, theta: f32) -> MycelResult<()> {
    check_target(state, control)?;
    check_target(state, target)?;
    let cmask = 1usize << control;
    let tmask = 1usize << target;
    let phase = Complex32::from_polar(1.0, theta);
    for (idx, amp) in state.amps.iter_mut().enumerate() {
        if idx & cmask != 0 && idx & tmask != 0 {
            *amp = *amp * phase;
        }
    }
    Ok(())
}

/// Toffoli / CCNOT: flips `target` when both control bits are 1.
pub fn toffoli(state: &mut QuantumState, control_a: u32, control_b: u32, target: u32) -> MycelResult<()> {
    check_target(state, control_a)?;
    check_target(state, control_b)?;
    check_target(state, target)?;
    let stride = 1usize << target;
    let mask_a = 1usize << control_a;
    let mask_b = 1usize << control_b;
    let dim = state.dim();
    let mut blk = 0;
    while blk * (2 * stride) < dim {
        for off in 0..stride {
            let i0 = blk * (2 * stride) + off;
            let i1 = i0 + stride;
            if i0 & mask_a != 0 && i0 & mask_b != 0 {
                state.amps.swap(i0, i1);
            }
        }
        blk += 1;
    }
    Ok(())
}

/// SWAP gate, implemented out-of-place via a temp buffer then copied back
/// (spec §4.9).
pub fn swap_qubits(state: &mut QuantumState, a: u32, b: u32) -> MycelResult<()> {
    check_target(state, a)?;
    check_target(state, b)?;
    if a == b {
        return Ok(());
    }
    let mask_a = 1usize << a;
    let mask_b = 1usize << b;
    let mut temp = state.amps.clone();
    for idx in 0..state.dim() {
        let bit_a = (idx & mask_a) != 0;
        let bit_b = (idx & mask_b) != 0;
        if bit_a != bit_b {
            let swapped = idx ^ mask_a ^ mask_b;
            temp[swapped] = state.amps[idx];
        }
    }
    state.amps = temp;
    Ok(())
}

/// Modular-exponentiation kernel used by Shor's period finding: conditions
/// the `target` register (a contiguous qubit range representing an
/// integer mod `n_mod`) on the integer value encoded in `exponent` bits,
/// computing `target_val * a^exponent_val mod n_mod`. Out-of-place via a
/// temp buffer, then copied back (spec §4.9).
pub fn modular_exponentiation(
    state: &mut QuantumState,
    exponent_qubits: std::ops::Range<u32>,
    target_qubits: std::ops::Range<u32>,
    a: u64,
    n_mod: u64,
) -> MycelResult<()> {
    if n_mod == 0 {
        return Err(MycelError::Validation("modulus must be nonzero".into()));
    }
    let exp_mask: usize = exponent_qubits.clone().map(|q| 1usize << q).sum();
    let exp_shift = exponent_qubits.start;
    let tgt_mask: usize = target_qubits.clone().map(|q| 1usize << q).sum();
    let tgt_shift = target_qubits.start;

    let mut temp = vec![Complex32::new(0.0, 0.0); state.dim()];
    for (idx, amp) in state.amps.iter().enumerate() {
        if amp.norm_sqr() == 0.0 {
            continue;
        }
        let exp_val = ((idx & exp_mask) >> exp_shift) as u64;
        let tgt_val = ((idx & tgt_mask) >> tgt_shift) as u64;
        let factor = mod_pow(a, exp_val, n_mod);
        let new_tgt = (tgt_val * factor) % n_mod;
        let new_idx = (idx & !tgt_mask) | ((new_tgt as usize) << tgt_shift);
        temp[new_idx] = temp[new_idx] + *amp;
    }
    state.amps = temp;
    Ok(())
}

fn mod_pow(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result = 1u64 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base) % modulus;
        }
        exp >>= 1;
        base = base.wrapping_mul(base) % modulus;
    }
    result
}

/// Inverse QFT over a contiguous range of qubits: the standard
/// H + controlled-phase sequence run in reverse, then a reversing swap
/// pass (spec §4.9).
pub fn inverse_qft(state: &mut QuantumState, qubits: std::ops::Range<u32>) -> MycelResult<()> {
    let qs: Vec<u32> = qubits.clone().collect();
    let n = qs.len();
    for i in (0..n).rev() {
        for j in (i + 1..n).rev() {
            let theta = -std::f32::consts::PI / (1u32 << (j - i)) as f32;
            controlled_phase(state, qs[j], qs[i], theta)?;
        }
        apply_single(state, qs[i], hadamard())?;
    }
    for i in 0..n / 2 {
        swap_qubits(state, qs[i], qs[n - 1 - i])?;
    }
    Ok(())
}

/// Grover oracle: phase-flip every basis state with `(idx & mask) == value`.
pub fn grover_oracle(state: &mut QuantumState, mask: usize, value: usize) {
    for (idx, amp) in state.amps.iter_mut().enumerate() {
        if idx & mask == value {
            *amp = -*amp;
        }
    }
}

/// Grover diffusion over all `num_qubits`: `H^(x n) -> phase-flip-except-zero -> H^(x n)`.
pub fn grover_diffusion(state: &mut QuantumState) -> MycelResult<()> {
    for t in 0..state.num_qubits {
        apply_single(state, t, hadamard())?;
    }
    for (idx, amp) in state.amps.iter_mut().enumerate() {
        if idx != 0 {
            *amp = -*amp;
        }
    }
    for t in 0..state.num_qubits {
        apply_single(state, t, hadamard())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hadamard_on_ground_state_gives_uniform_superposition() {
        let mut s = QuantumState::zero(1).unwrap();
        apply_single(&mut s, 0, hadamard()).unwrap();
        let p = s.probabilities();
        assert!((p[0] - 0.5).abs() < 1e-6);
        assert!((p[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cnot_flips_target_only_when_control_set() {
        let mut s = QuantumState::zero(2).unwrap();
        apply_single(&mut s, 0, pauli_x()).unwrap(); // |01> (qubit 0 = control = 1)
        cnot(&mut s, 0, 1).unwrap();
        // index 0b11 = 3 should now hold the amplitude.
        assert!((s.amps[3].norm_sqr() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn swap_qubits_round_trips_to_identity() {
        let mut s = QuantumState::zero(2).unwrap();
        apply_single(&mut s, 0, pauli_x()).unwrap();
        swap_qubits(&mut s, 0, 1).unwrap();
        swap_qubits(&mut s, 0, 1).unwrap();
        assert!((s.amps[1].norm_sqr() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mod_pow_matches_textbook_modular_exponentiation() {
        assert_eq!(mod_pow(7, 0, 15), 1);
        assert_eq!(mod_pow(7, 1, 15), 7);
        assert_eq!(mod_pow(7, 4, 15), 1); // ord_15(7) = 4
    }

    #[test]
    fn grover_oracle_flips_only_matching_basis_states() {
        let mut s = QuantumState::zero(2).unwrap();
        for a in s.amps.iter_mut() {
            *a = Complex32::new(0.5, 0.0);
        }
        grover_oracle(&mut s, 0b11, 0b10);
        assert!((s.amps[0b10].re + 0.5).abs() < 1e-6);
        assert!((s.amps[0b11].re - 0.5).abs() < 1e-6);
    }
}
