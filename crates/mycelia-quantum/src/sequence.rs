//! Gate-sequence apply/dagger with peephole fusion, and the profile
//! counters exported as the "last echo profile" struct — spec §4.9.

use mycelia_core::MycelResult;

use crate::gates;
use crate::profile::EchoProfile;
use crate::state::QuantumState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOp {
    X { target: u32 },
    Y { target: u32 },
    Z { target: u32 },
    H { target: u32 },
    Rx { target: u32, theta: f32 },
    Ry { target: u32, theta: f32 },
    Rz { target: u32, theta: f32 },
    Cnot { control: u32, target: u32 },
    CPhase { control: u32, target: u32, theta: f32 },
    Toffoli { control_a: u32, control_b: u32, target: u32 },
}

impl GateOp {
    fn qubit_count(&self) -> u32 {
        match self {
            GateOp::X { .. } | GateOp::Y { .. } | GateOp::Z { .. } | GateOp::H { .. } | GateOp::Rx { .. } | GateOp::Ry { .. } | GateOp::Rz { .. } => 1,
            GateOp::Cnot { .. } | GateOp::CPhase { .. } => 2,
            GateOp::Toffoli { .. } => 3,
        }
    }

    /// Adjoint of a single gate: rotations negate their angle, Pauli/H/CNOT
    /// are self-adjoint.
    fn adjoint(self) -> GateOp {
        match self {
            GateOp::Rx { target, theta } => GateOp::Rx { target, theta: -theta },
            GateOp::Ry { target, theta } => GateOp::Ry { target, theta: -theta },
            GateOp::Rz { target, theta } => GateOp::Rz { target, theta: -theta },
            GateOp::CPhase { control, target, theta } => GateOp::CPhase { control, target, theta: -theta },
            other => other,
        }
    }
}

fn apply_one(state: &mut QuantumState, op: GateOp) -> MycelResult<()> {
    match op {
        GateOp::X { target } => gates::apply_single(state, target, gates::pauli_x()),
        GateOp::Y { target } => gates::apply_single(state, target, gates::pauli_y()),
        GateOp::Z { target } => gates::apply_single(state, target, gates::pauli_z()),
        GateOp::H { target } => gates::apply_single(state, target, gates::hadamard()),
        GateOp::Rx { target, theta } => gates::apply_single(state, target, gates::rx(theta)),
        GateOp::Ry { target, theta } => gates::apply_single(state, target, gates::ry(theta)),
        GateOp::Rz { target, theta } => gates::apply_single(state, target, gates::rz(theta)),
        GateOp::Cnot { control, target } => gates::cnot(state, control, target),
        GateOp::CPhase { control, target, theta } => gates::controlled_phase(state, control, target, theta),
        GateOp::Toffoli { control_a, control_b, target } => gates::toffoli(state, control_a, control_b, target),
    }
}

/// Run `ops` in order, updating `profile`'s gate/enqueue/byte counters.
pub fn apply_sequence(state: &mut QuantumState, ops: &[GateOp], profile: &mut EchoProfile) -> MycelResult<()> {
    let bytes_per_enqueue = (state.dim() * std::mem::size_of::<num_complex::Complex32>()) as u64;
    for &op in ops {
        apply_one(state, op)?;
        profile.record_gate(op.qubit_count());
        profile.total_enqueues += 1;
        profile.bytes_touched += bytes_per_enqueue;
    }
    Ok(())
}

/// Reverse order, negate rotation angles (spec §4.9's adjoint rule).
pub fn dagger(ops: &[GateOp]) -> Vec<GateOp> {
    ops.iter().rev().map(|&op| op.adjoint()).collect()
}

pub fn apply_sequence_dagger(state: &mut QuantumState, ops: &[GateOp], profile: &mut EchoProfile) -> MycelResult<()> {
    apply_sequence(state, &dagger(ops), profile)
}

/// Peephole fusion: adjacent same-axis rotations on the same target are
/// added; adjacent identical Pauli X/Y/Z pairs on the same target cancel
/// to identity (spec §4.9). Returns the fused sequence and the number of
/// fused groups collapsed.
pub fn fuse(ops: &[GateOp]) -> (Vec<GateOp>, u32) {
    let mut out: Vec<GateOp> = Vec::with_capacity(ops.len());
    let mut fused_groups = 0u32;
    for &op in ops {
        if let Some(&last) = out.last() {
            match try_fuse(last, op) {
                FuseResult::Cancel => {
                    out.pop();
                    fused_groups += 1;
                    continue;
                }
                FuseResult::Combine(combined) => {
                    out.pop();
                    out.push(combined);
                    fused_groups += 1;
                    continue;
                }
                FuseResult::NoFuse => {}
            }
        }
        out.push(op);
    }
    (out, fused_groups)
}

enum FuseResult {
    NoFuse,
    Cancel,
    Combine(GateOp),
}

fn try_fuse(a: GateOp, b: GateOp) -> FuseResult {
    match (a, b) {
        (GateOp::Rx { target: t1, theta: th1 }, GateOp::Rx { target: t2, theta: th2 }) if t1 == t2 => {
            FuseResult::Combine(GateOp::Rx { target: t1, theta: th1 + th2 })
        }
        (GateOp::Ry { target: t1, theta: th1 }, GateOp::Ry { target: t2, theta: th2 }) if t1 == t2 => {
            FuseResult::Combine(GateOp::Ry { target: t1, theta: th1 + th2 })
        }
        (GateOp::Rz { target: t1, theta: th1 }, GateOp::Rz { target: t2, theta: th2 }) if t1 == t2 => {
            FuseResult::Combine(GateOp::Rz { target: t1, theta: th1 + th2 })
        }
        (GateOp::X { target: t1 }, GateOp::X { target: t2 }) if t1 == t2 => FuseResult::Cancel,
        (GateOp::Y { target: t1 }, GateOp::Y { target: t2 }) if t1 == t2 => FuseResult::Cancel,
        (GateOp::Z { target: t1 }, GateOp::Z { target: t2 }) if t1 == t2 => FuseResult::Cancel,
        _ => FuseResult::NoFuse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_fusion_law_combines_same_axis_rotations() {
        let ops = vec![GateOp::Rx { target: 0, theta: 0.3 }, GateOp::Rx { target: 0, theta: 0.7 }];
        let (fused, groups) = fuse(&ops);
        assert_eq!(groups, 1);
        assert_eq!(fused, vec![GateOp::Rx { target: 0, theta: 1.0 }]);
    }

    #[test]
    fn identical_pauli_pairs_cancel_to_identity() {
        let ops = vec![GateOp::X { target: 1 }, GateOp::X { target: 1 }];
        let (fused, groups) = fuse(&ops);
        assert!(fused.is_empty());
        assert_eq!(groups, 1);
    }

    #[test]
    fn adjoint_law_holds_within_norm_tolerance() {
        let mut state = QuantumState::zero(2).unwrap();
        let mut profile = EchoProfile::default();
        let ops = vec![
            GateOp::H { target: 0 },
            GateOp::Cnot { control: 0, target: 1 },
            GateOp::Rz { target: 1, theta: 0.5 },
        ];
        apply_sequence(&mut state, &ops, &mut profile).unwrap();
        apply_sequence_dagger(&mut state, &ops, &mut profile).unwrap();
        assert!(state.check_norm1(1e-3));
        assert!((state.amps[0].norm_sqr() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn profile_counts_gates_by_arity() {
        let mut state = QuantumState::zero(2).unwrap();
        let mut profile = EchoProfile::default();
        let ops = vec![GateOp::H { target: 0 }, GateOp::Cnot { control: 0, target: 1 }];
        apply_sequence(&mut state, &ops, &mut profile).unwrap();
        assert_eq!(profile.single_qubit_gates, 1);
        assert_eq!(profile.two_qubit_gates, 1);
        assert_eq!(profile.total_enqueues, 2);
    }
}
