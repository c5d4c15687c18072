//! Quantum echo and second-order OTOC — spec §4.9 / GLOSSARY.

use mycelia_core::MycelResult;

use crate::profile::EchoProfile;
use crate::sequence::{apply_sequence, dagger, GateOp};
use crate::state::QuantumState;

/// Runs `U -> W -> U^dagger` starting from `initial`, reads amplitude 0,
/// and returns the Loschmidt echo `L = |alpha_0|^2`.
pub fn run_echo(initial: &QuantumState, u: &[GateOp], w: &[GateOp], profile: &mut EchoProfile) -> MycelResult<f32> {
    let mut state = initial.clone();
    apply_sequence(&mut state, u, profile)?;
    apply_sequence(&mut state, w, profile)?;
    apply_sequence(&mut state, &dagger(u), profile)?;
    Ok(state.amps[0].norm_sqr())
}

/// Runs `U -> W -> U^dagger -> V -> U -> W^dagger -> U^dagger -> V^dagger`
/// and returns `(Re, Im)` of amplitude 0 — the second-order
/// out-of-time-order correlator.
pub fn run_otoc2(
    initial: &QuantumState,
    u: &[GateOp],
    w: &[GateOp],
    v: &[GateOp],
    profile: &mut EchoProfile,
) -> MycelResult<(f32, f32)> {
    let mut state = initial.clone();
    apply_sequence(&mut state, u, profile)?;
    apply_sequence(&mut state, w, profile)?;
    apply_sequence(&mut state, &dagger(u), profile)?;
    apply_sequence(&mut state, v, profile)?;
    apply_sequence(&mut state, u, profile)?;
    apply_sequence(&mut state, &dagger(w), profile)?;
    apply_sequence(&mut state, &dagger(u), profile)?;
    apply_sequence(&mut state, &dagger(v), profile)?;
    let amp0 = state.amps[0];
    Ok((amp0.re, amp0.im))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_with_identity_perturbation_returns_full_revival() {
        let initial = QuantumState::zero(2).unwrap();
        let u = vec![GateOp::H { target: 0 }, GateOp::Cnot { control: 0, target: 1 }];
        let w: Vec<GateOp> = vec![]; // no perturbation: should perfectly revive
        let mut profile = EchoProfile::default();
        let l = run_echo(&initial, &u, &w, &mut profile).unwrap();
        assert!((l - 1.0).abs() < 1e-3);
    }

    #[test]
    fn otoc2_output_is_bounded_by_norm() {
        let initial = QuantumState::zero(2).unwrap();
        let u = vec![GateOp::H { target: 0 }];
        let w = vec![GateOp::Rz { target: 0, theta: 0.3 }];
        let v = vec![GateOp::Cnot { control: 0, target: 1 }];
        let mut profile = EchoProfile::default();
        let (re, im) = run_otoc2(&initial, &u, &w, &v, &mut profile).unwrap();
        assert!(re * re + im * im <= 1.0 + 1e-3);
    }
}
