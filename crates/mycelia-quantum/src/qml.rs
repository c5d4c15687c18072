//! QML feature map — spec §4.9 / §6 (`execute_qml_classifier_gpu`).
//!
//! Angle-encodes a classical feature vector onto `RY` rotations, then
//! entangles adjacent qubits with a `ZZ`-style controlled-phase layer
//! scaled by the product of the two features (a standard second-order
//! Pauli feature map).

use mycelia_core::{MycelError, MycelResult};

use crate::gates::{apply_single, controlled_phase, ry};
use crate::state::QuantumState;

pub fn apply_feature_map(state: &mut QuantumState, features: &[f32]) -> MycelResult<()> {
    if features.len() as u32 != state.num_qubits {
        return Err(MycelError::Validation(format!(
            "feature count {} must equal qubit count {}",
            features.len(),
            state.num_qubits
        )));
    }
    for (q, &f) in features.iter().enumerate() {
        apply_single(state, q as u32, ry(f * std::f32::consts::PI))?;
    }
    for q in 0..features.len().saturating_sub(1) {
        let theta = features[q] * features[q + 1] * std::f32::consts::PI;
        controlled_phase(state, q as u32, (q + 1) as u32, theta)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_map_preserves_norm() {
        let mut state = QuantumState::zero(3).unwrap();
        apply_feature_map(&mut state, &[0.1, 0.4, 0.9]).unwrap();
        assert!(state.check_norm1(1e-4));
    }

    #[test]
    fn rejects_feature_qubit_count_mismatch() {
        let mut state = QuantumState::zero(2).unwrap();
        assert!(apply_feature_map(&mut state, &[0.1, 0.2, 0.3]).is_err());
    }
}
