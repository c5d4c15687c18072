//! Quantum algorithm entry points — spec §4.9 / §6.
//!
//! Every `gpu_index` slot owns at most one resident [`mycelia_quantum::QuantumState`],
//! mirroring the single-device-memory-resident-state convention the
//! SubQG/mycel layers already use. All entry points are refused with
//! `not_initialized` when `set_quantum_enabled(gpu, 0)` (or
//! `CC_DISABLE_QUANTUM=1`) has turned the subsystem off.

use std::ffi::{c_char, CStr, CString};

use mycelia_core::MycelError;
use mycelia_quantum::{echo, grover, hhl, qaoa, qec, qml, sequence, shor, state::QuantumState, vqe, EchoProfile, GateOp};
use num_complex::Complex32;

use crate::driver::{driver, with_slot, GpuSlot};
use crate::error_state::guard;

fn require_quantum_enabled() -> Result<(), MycelError> {
    let enabled = driver().lock().expect("driver mutex poisoned").quantum_enabled();
    if enabled {
        Ok(())
    } else {
        Err(MycelError::Capability("quantum subsystem is disabled".into()))
    }
}

/// C-ABI mirror of [`GateOp`]: `kind` selects the variant, unused fields
/// are ignored (e.g. `control`/`control_b` for single-qubit gates).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiGateOp {
    pub kind: u8,
    pub target: u32,
    pub control: u32,
    pub control_b: u32,
    pub theta: f32,
}

const KIND_X: u8 = 0;
const KIND_Y: u8 = 1;
const KIND_Z: u8 = 2;
const KIND_H: u8 = 3;
const KIND_RX: u8 = 4;
const KIND_RY: u8 = 5;
const KIND_RZ: u8 = 6;
const KIND_CNOT: u8 = 7;
const KIND_CPHASE: u8 = 8;
const KIND_TOFFOLI: u8 = 9;

fn ffi_to_gate_op(op: &FfiGateOp) -> Result<GateOp, MycelError> {
    Ok(match op.kind {
        KIND_X => GateOp::X { target: op.target },
        KIND_Y => GateOp::Y { target: op.target },
        KIND_Z => GateOp::Z { target: op.target },
        KIND_H => GateOp::H { target: op.target },
        KIND_RX => GateOp::Rx { target: op.target, theta: op.theta },
        KIND_RY => GateOp::Ry { target: op.target, theta: op.theta },
        KIND_RZ => GateOp::Rz { target: op.target, theta: op.theta },
        KIND_CNOT => GateOp::Cnot { control: op.control, target: op.target },
        KIND_CPHASE => GateOp::CPhase { control: op.control, target: op.target, theta: op.theta },
        KIND_TOFFOLI => GateOp::Toffoli { control_a: op.control, control_b: op.control_b, target: op.target },
        other => return Err(MycelError::Validation(format!("unknown gate kind {other}"))),
    })
}

fn quantum_slot<T>(gpu_index: u32, f: impl FnOnce(&mut GpuSlot) -> Result<T, MycelError>) -> Result<T, MycelError> {
    require_quantum_enabled()?;
    with_slot(gpu_index, f)
}

/// # Safety
/// `ops` must point to `len` valid [`FfiGateOp`] records.
#[no_mangle]
pub unsafe extern "C" fn quantum_upload_gate_sequence(gpu_index: u32, ops: *const FfiGateOp, len: u64) -> i32 {
    guard(1, 0, move || {
        if ops.is_null() {
            return Err(MycelError::Validation("ops is null".into()));
        }
        let raw = std::slice::from_raw_parts(ops, len as usize);
        let mut parsed = Vec::with_capacity(raw.len());
        for op in raw {
            parsed.push(ffi_to_gate_op(op)?);
        }
        quantum_slot(gpu_index, |slot| {
            slot.staged_gates = parsed;
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn quantum_apply_gate_sequence(gpu_index: u32, num_qubits: u32) -> i32 {
    guard(1, 0, move || {
        quantum_slot(gpu_index, |slot| {
            if slot.quantum_state.is_none() {
                slot.quantum_state = Some(QuantumState::zero(num_qubits)?);
            }
            let ops = std::mem::take(&mut slot.staged_gates);
            let state = slot.quantum_state.as_mut().unwrap();
            sequence::apply_sequence(state, &ops, &mut slot.last_quantum_profile)
        })
    })
}

#[no_mangle]
pub extern "C" fn execute_shor_gpu(gpu_index: u32, counting_qubits: u32, target_qubits: u32, a: u64, n_mod: u64) -> i32 {
    guard(1, 0, move || {
        quantum_slot(gpu_index, |slot| {
            slot.quantum_state = Some(shor::run_period_finding(counting_qubits, target_qubits, a, n_mod)?);
            Ok(())
        })
    })
}

/// Classical continued-fraction period recovery from a measured counting
/// register value. Returns the recovered period, or 0 if none was found.
#[no_mangle]
pub extern "C" fn shor_recover_period(measured: u64, counting_qubits: u32, n_mod: u64) -> u64 {
    shor::continued_fraction_period(measured, counting_qubits, n_mod).unwrap_or(0)
}

/// # Safety
/// `out_most_probable`/`out_probability` must be valid writable pointers.
#[no_mangle]
pub unsafe extern "C" fn execute_grover_gpu(
    gpu_index: u32,
    num_qubits: u32,
    iterations: u32,
    mask: u64,
    value: u64,
    out_most_probable: *mut u64,
    out_probability: *mut f32,
) -> i32 {
    guard(1, 0, move || {
        if out_most_probable.is_null() || out_probability.is_null() {
            return Err(MycelError::Validation("output pointers must be non-null".into()));
        }
        let result = grover::run_grover(num_qubits, iterations, mask as usize, value as usize)?;
        quantum_slot(gpu_index, |slot| {
            *out_most_probable = result.most_probable as u64;
            *out_probability = result.probability;
            slot.quantum_state = Some(QuantumState::zero(num_qubits)?);
            Ok(())
        })
    })
}

/// # Safety
/// `params` must point to `param_len` `f32`s; `term_coeffs`/`term_masks`
/// to `n_terms` entries each; `out_energy` must be writable.
#[no_mangle]
pub unsafe extern "C" fn execute_vqe_gpu(
    gpu_index: u32,
    num_qubits: u32,
    layers: u32,
    params: *const f32,
    param_len: u64,
    term_coeffs: *const f32,
    term_masks: *const u64,
    n_terms: u64,
    out_energy: *mut f32,
) -> i32 {
    guard(1, 0, move || {
        if params.is_null() || term_coeffs.is_null() || term_masks.is_null() || out_energy.is_null() {
            return Err(MycelError::Validation("null pointer argument".into()));
        }
        let params = std::slice::from_raw_parts(params, param_len as usize);
        let hamiltonian = collect_hamiltonian(term_coeffs, term_masks, n_terms);
        let e = vqe::energy(num_qubits, layers, params, &hamiltonian)?;
        quantum_slot(gpu_index, |_slot| {
            *out_energy = e;
            Ok(())
        })
    })
}

/// # Safety
/// Same contract as [`execute_vqe_gpu`]; `out_grads` must point to
/// `param_len` writable `f32`s.
#[no_mangle]
pub unsafe extern "C" fn execute_vqe_gradients_parallel_gpu(
    gpu_index: u32,
    num_qubits: u32,
    layers: u32,
    params: *const f32,
    param_len: u64,
    term_coeffs: *const f32,
    term_masks: *const u64,
    n_terms: u64,
    out_grads: *mut f32,
) -> i32 {
    guard(1, 0, move || {
        if params.is_null() || term_coeffs.is_null() || term_masks.is_null() || out_grads.is_null() {
            return Err(MycelError::Validation("null pointer argument".into()));
        }
        let params = std::slice::from_raw_parts(params, param_len as usize);
        let hamiltonian = collect_hamiltonian(term_coeffs, term_masks, n_terms);
        let grads = vqe::parameter_shift_gradients(num_qubits, layers, params, &hamiltonian)?;
        quantum_slot(gpu_index, |_slot| {
            std::ptr::copy_nonoverlapping(grads.as_ptr(), out_grads, grads.len());
            Ok(())
        })
    })
}

unsafe fn collect_hamiltonian(coeffs: *const f32, masks: *const u64, n: u64) -> Vec<vqe::PauliZTerm> {
    let coeffs = std::slice::from_raw_parts(coeffs, n as usize);
    let masks = std::slice::from_raw_parts(masks, n as usize);
    coeffs
        .iter()
        .zip(masks)
        .map(|(&coeff, &mask)| vqe::PauliZTerm { coeff, mask })
        .collect()
}

/// # Safety
/// `gammas`/`betas` must point to `p_layers` `f32`s; `term_coeffs`/
/// `term_masks` to `n_terms` entries; `out_cost` must be writable.
#[no_mangle]
pub unsafe extern "C" fn execute_qaoa_gpu(
    gpu_index: u32,
    num_qubits: u32,
    gammas: *const f32,
    betas: *const f32,
    p_layers: u64,
    term_coeffs: *const f32,
    term_masks: *const u64,
    n_terms: u64,
    out_cost: *mut f32,
) -> i32 {
    guard(1, 0, move || {
        if gammas.is_null() || betas.is_null() || term_coeffs.is_null() || term_masks.is_null() || out_cost.is_null() {
            return Err(MycelError::Validation("null pointer argument".into()));
        }
        let gammas = std::slice::from_raw_parts(gammas, p_layers as usize);
        let betas = std::slice::from_raw_parts(betas, p_layers as usize);
        let cost = collect_hamiltonian(term_coeffs, term_masks, n_terms);
        let state = qaoa::run_qaoa(num_qubits, gammas, betas, &cost)?;
        let cost_val = qaoa::cost_expectation(&state, &cost);
        quantum_slot(gpu_index, |slot| {
            slot.quantum_state = Some(state);
            *out_cost = cost_val;
            Ok(())
        })
    })
}

/// # Safety
/// `b_re`/`b_im`/`eigenvalues` must point to `dim` entries; `out_sol_re`/
/// `out_sol_im` must point to `dim` writable `f32`s.
#[no_mangle]
pub unsafe extern "C" fn execute_hhl_gpu(
    gpu_index: u32,
    b_re: *const f32,
    b_im: *const f32,
    eigenvalues: *const f32,
    dim: u64,
    c_const: f32,
    out_sol_re: *mut f32,
    out_sol_im: *mut f32,
) -> i32 {
    guard(1, 0, move || {
        if b_re.is_null() || b_im.is_null() || eigenvalues.is_null() || out_sol_re.is_null() || out_sol_im.is_null() {
            return Err(MycelError::Validation("null pointer argument".into()));
        }
        let re = std::slice::from_raw_parts(b_re, dim as usize);
        let im = std::slice::from_raw_parts(b_im, dim as usize);
        let eigen = std::slice::from_raw_parts(eigenvalues, dim as usize);
        let b_vector: Vec<Complex32> = re.iter().zip(im).map(|(&r, &i)| Complex32::new(r, i)).collect();
        let state = hhl::run_hhl_bootstrap(&b_vector, eigen, c_const)?;
        let work_qubits = (dim as usize).trailing_zeros();
        let solution = hhl::extract_solution_branch(&state, work_qubits);
        quantum_slot(gpu_index, |slot| {
            for (i, amp) in solution.iter().enumerate() {
                *out_sol_re.add(i) = amp.re;
                *out_sol_im.add(i) = amp.im;
            }
            slot.quantum_state = Some(state);
            Ok(())
        })
    })
}

/// # Safety
/// `features` must point to `len` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn execute_qml_classifier_gpu(gpu_index: u32, features: *const f32, len: u64) -> i32 {
    guard(1, 0, move || {
        if features.is_null() {
            return Err(MycelError::Validation("features is null".into()));
        }
        let features = std::slice::from_raw_parts(features, len as usize);
        quantum_slot(gpu_index, |slot| {
            let mut state = QuantumState::zero(len as u32)?;
            qml::apply_feature_map(&mut state, features)?;
            slot.quantum_state = Some(state);
            Ok(())
        })
    })
}

/// Runs one QEC cycle: prepares the Steane-7 logical zero state, resolves
/// the classical syndrome of `error_mask`, and writes the located qubit
/// (or -1 for no error) to `out_location`.
///
/// # Safety
/// `out_syndrome`/`out_location` must be valid writable pointers.
#[no_mangle]
pub unsafe extern "C" fn execute_qec_cycle_gpu(gpu_index: u32, error_mask: u8, out_syndrome: *mut u8, out_location: *mut i32) -> i32 {
    guard(1, 0, move || {
        if out_syndrome.is_null() || out_location.is_null() {
            return Err(MycelError::Validation("output pointers must be non-null".into()));
        }
        let syn = qec::syndrome(error_mask);
        let loc = qec::locate_single_qubit_error(syn);
        quantum_slot(gpu_index, |slot| {
            *out_syndrome = syn;
            *out_location = loc.map(|l| l as i32).unwrap_or(-1);
            slot.quantum_state = Some(qec::steane7_zero_state());
            Ok(())
        })
    })
}

/// Runs a Loschmidt echo (`v` empty) or second-order OTOC (`v` non-empty)
/// from `initial`, writing `(Re, Im)` of amplitude 0 to the outputs.
///
/// # Safety
/// `u`/`w`/`v` (when non-null) must point to their respective lengths of
/// [`FfiGateOp`]; `out_re`/`out_im` must be writable.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn execute_quantum_echoes_otoc_gpu(
    gpu_index: u32,
    num_qubits: u32,
    u: *const FfiGateOp,
    u_len: u64,
    w: *const FfiGateOp,
    w_len: u64,
    v: *const FfiGateOp,
    v_len: u64,
    out_re: *mut f32,
    out_im: *mut f32,
) -> i32 {
    guard(1, 0, move || {
        if u.is_null() || w.is_null() || out_re.is_null() || out_im.is_null() {
            return Err(MycelError::Validation("null pointer argument".into()));
        }
        let parse = |ptr: *const FfiGateOp, len: u64| -> Result<Vec<GateOp>, MycelError> {
            std::slice::from_raw_parts(ptr, len as usize).iter().map(ffi_to_gate_op).collect()
        };
        let u_ops = parse(u, u_len)?;
        let w_ops = parse(w, w_len)?;
        let v_ops = if v.is_null() || v_len == 0 { Vec::new() } else { parse(v, v_len)? };
        let initial = QuantumState::zero(num_qubits)?;
        quantum_slot(gpu_index, |slot| {
            if v_ops.is_empty() {
                let l = echo::run_echo(&initial, &u_ops, &w_ops, &mut slot.last_quantum_profile)?;
                *out_re = l;
                *out_im = 0.0;
            } else {
                let (re, im) = echo::run_otoc2(&initial, &u_ops, &w_ops, &v_ops, &mut slot.last_quantum_profile)?;
                *out_re = re;
                *out_im = im;
            }
            Ok(())
        })
    })
}

fn gate_to_qasm_line(op: &GateOp) -> String {
    match *op {
        GateOp::X { target } => format!("x q[{target}];"),
        GateOp::Y { target } => format!("y q[{target}];"),
        GateOp::Z { target } => format!("z q[{target}];"),
        GateOp::H { target } => format!("h q[{target}];"),
        GateOp::Rx { target, theta } => format!("rx({theta}) q[{target}];"),
        GateOp::Ry { target, theta } => format!("ry({theta}) q[{target}];"),
        GateOp::Rz { target, theta } => format!("rz({theta}) q[{target}];"),
        GateOp::Cnot { control, target } => format!("cx q[{control}],q[{target}];"),
        GateOp::CPhase { control, target, theta } => format!("cp({theta}) q[{control}],q[{target}];"),
        GateOp::Toffoli { control_a, control_b, target } => format!("ccx q[{control_a}],q[{control_b}],q[{target}];"),
    }
}

fn qasm_line_to_gate(line: &str) -> Option<GateOp> {
    let line = line.trim().trim_end_matches(';');
    let (head, rest) = line.split_once(' ')?;
    let qubits: Vec<u32> = rest
        .trim_start_matches("q[")
        .trim_end_matches(']')
        .split("],q[")
        .filter_map(|s| s.parse().ok())
        .collect();
    if let Some((name, arg)) = head.split_once('(') {
        let theta: f32 = arg.trim_end_matches(')').parse().ok()?;
        let target = *qubits.first()?;
        return match name {
            "rx" => Some(GateOp::Rx { target, theta }),
            "ry" => Some(GateOp::Ry { target, theta }),
            "rz" => Some(GateOp::Rz { target, theta }),
            "cp" => Some(GateOp::CPhase { control: target, target: *qubits.get(1)?, theta }),
            _ => None,
        };
    }
    match head {
        "x" => Some(GateOp::X { target: *qubits.first()? }),
        "y" => Some(GateOp::Y { target: *qubits.first()? }),
        "z" => Some(GateOp::Z { target: *qubits.first()? }),
        "h" => Some(GateOp::H { target: *qubits.first()? }),
        "cx" => Some(GateOp::Cnot { control: *qubits.first()?, target: *qubits.get(1)? }),
        "ccx" => Some(GateOp::Toffoli { control_a: *qubits.first()?, control_b: *qubits.get(1)?, target: *qubits.get(2)? }),
        _ => None,
    }
}

/// Exports the slot's staged gate sequence as a minimal OpenQASM-2-style
/// subset (one gate per line, no header/measurement statements). Size-probe
/// contract: when `out` is null or `buf_len == 0`, returns the required
/// byte length (including the nul terminator) without writing.
///
/// # Safety
/// `out`, when non-null, must point to at least `buf_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn quantum_export_to_qasm(gpu_index: u32, out: *mut c_char, buf_len: u64) -> i64 {
    let result = quantum_slot(gpu_index, |slot| {
        let text: String = slot.staged_gates.iter().map(gate_to_qasm_line).collect::<Vec<_>>().join("\n");
        let cstring = CString::new(text).map_err(|_| MycelError::Validation("gate text contained a nul byte".into()))?;
        let required = cstring.as_bytes_with_nul().len() as u64;
        if out.is_null() || buf_len == 0 {
            return Ok(required as i64);
        }
        if buf_len < required {
            return Err(MycelError::Validation(format!("buffer of {buf_len} bytes too small for {required} bytes of QASM")));
        }
        std::ptr::copy_nonoverlapping(cstring.as_ptr(), out, required as usize);
        Ok(required as i64)
    });
    match result {
        Ok(n) => n,
        Err(e) => {
            crate::error_state::set_error_from_mycel(&e);
            -1
        }
    }
}

/// Parses the minimal QASM subset written by [`quantum_export_to_qasm`]
/// back into the slot's staged gate sequence. Unrecognized lines are
/// skipped.
///
/// # Safety
/// `qasm` must be a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn quantum_import_from_qasm(gpu_index: u32, qasm: *const c_char) -> i32 {
    guard(1, 0, move || {
        if qasm.is_null() {
            return Err(MycelError::Validation("qasm is null".into()));
        }
        let text = CStr::from_ptr(qasm).to_str().map_err(|_| MycelError::Validation("qasm is not valid UTF-8".into()))?;
        let ops: Vec<GateOp> = text.lines().filter(|l| !l.trim().is_empty()).filter_map(qasm_line_to_gate).collect();
        quantum_slot(gpu_index, |slot| {
            slot.staged_gates = ops;
            Ok(())
        })
    })
}

/// Mirrors [`EchoProfile`]'s field layout for the C ABI.
#[repr(C)]
pub struct FfiEchoProfile {
    pub single_qubit_gates: u64,
    pub two_qubit_gates: u64,
    pub three_qubit_gates: u64,
    pub fused_groups: u32,
    pub total_enqueues: u64,
    pub bytes_touched: u64,
}

impl From<EchoProfile> for FfiEchoProfile {
    fn from(p: EchoProfile) -> Self {
        Self {
            single_qubit_gates: p.single_qubit_gates,
            two_qubit_gates: p.two_qubit_gates,
            three_qubit_gates: p.three_qubit_gates,
            fused_groups: p.fused_groups,
            total_enqueues: p.total_enqueues,
            bytes_touched: p.bytes_touched,
        }
    }
}

/// # Safety
/// `out` must be a valid writable pointer.
#[no_mangle]
pub unsafe extern "C" fn get_last_quantum_echo_profile(gpu_index: u32, out: *mut FfiEchoProfile) -> i32 {
    guard(1, 0, move || {
        if out.is_null() {
            return Err(MycelError::Validation("out is null".into()));
        }
        quantum_slot(gpu_index, |slot| {
            *out = slot.last_quantum_profile.into();
            Ok(())
        })
    })
}

/// Peephole-fuses the slot's staged gate sequence in place, returning the
/// number of fused groups collapsed.
#[no_mangle]
pub extern "C" fn quantum_fuse_staged_sequence(gpu_index: u32) -> i32 {
    let mut fused_groups: i32 = -1;
    let result = quantum_slot(gpu_index, |slot| {
        let (fused, groups) = sequence::fuse(&slot.staged_gates);
        slot.staged_gates = fused;
        fused_groups = groups as i32;
        Ok(())
    });
    match result {
        Ok(()) => fused_groups,
        Err(e) => {
            crate::error_state::set_error_from_mycel(&e);
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::initialize_gpu;

    #[test]
    fn upload_apply_and_read_profile_round_trip() {
        let idx = 20u32;
        assert_eq!(initialize_gpu(idx), 1);
        let ops = [
            FfiGateOp { kind: KIND_H, target: 0, control: 0, control_b: 0, theta: 0.0 },
            FfiGateOp { kind: KIND_CNOT, target: 1, control: 0, control_b: 0, theta: 0.0 },
        ];
        assert_eq!(unsafe { quantum_upload_gate_sequence(idx, ops.as_ptr(), ops.len() as u64) }, 1);
        assert_eq!(quantum_apply_gate_sequence(idx, 2), 1);

        let mut profile = FfiEchoProfile {
            single_qubit_gates: 0,
            two_qubit_gates: 0,
            three_qubit_gates: 0,
            fused_groups: 0,
            total_enqueues: 0,
            bytes_touched: 0,
        };
        assert_eq!(unsafe { get_last_quantum_echo_profile(idx, &mut profile) }, 1);
        assert_eq!(profile.single_qubit_gates, 1);
        assert_eq!(profile.two_qubit_gates, 1);
    }

    #[test]
    fn grover_finds_marked_state_through_the_abi() {
        let idx = 21u32;
        assert_eq!(initialize_gpu(idx), 1);
        let mut most_probable = 0u64;
        let mut probability = 0.0f32;
        let ok = unsafe { execute_grover_gpu(idx, 5, 4, 0x1F, 0b10110, &mut most_probable, &mut probability) };
        assert_eq!(ok, 1);
        assert_eq!(most_probable, 0b10110);
        assert!(probability > 0.95);
    }

    #[test]
    fn qasm_export_size_probe_matches_actual_write() {
        let idx = 22u32;
        assert_eq!(initialize_gpu(idx), 1);
        let ops = [FfiGateOp { kind: KIND_H, target: 0, control: 0, control_b: 0, theta: 0.0 }];
        unsafe { quantum_upload_gate_sequence(idx, ops.as_ptr(), ops.len() as u64) };
        let required = unsafe { quantum_export_to_qasm(idx, std::ptr::null_mut(), 0) };
        assert!(required > 0);
        let mut buf = vec![0i8; required as usize];
        let written = unsafe { quantum_export_to_qasm(idx, buf.as_mut_ptr(), buf.len() as u64) };
        assert_eq!(written, required);
    }

    #[test]
    fn quantum_disabled_refuses_execution() {
        let idx = 23u32;
        assert_eq!(initialize_gpu(idx), 1);
        crate::lifecycle::set_quantum_enabled(idx, 0);
        let mut most_probable = 0u64;
        let mut probability = 0.0f32;
        let ok = unsafe { execute_grover_gpu(idx, 2, 1, 0b11, 0b01, &mut most_probable, &mut probability) };
        assert_eq!(ok, 0);
        crate::lifecycle::set_quantum_enabled(idx, 1);
    }
}
