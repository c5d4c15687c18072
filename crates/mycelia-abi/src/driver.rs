//! The single owned `Driver` instance the C ABI is a thin facade over —
//! spec §9 Design Notes: "Mutable singletons... carry them in an
//! explicitly-owned Driver value."
//!
//! Device-memory handles here are host-backed byte buffers rather than
//! live OpenCL allocations: `mycelia-gpu::DeviceRegistry` owns the real
//! device/context/queue lifecycle (see that crate for the OpenCL side),
//! while this facade's simulation state (SubQG/mycel/agents/brain) is the
//! host mirror in `mycelia-sim`, kept resident the same way the spec
//! describes VRAM-resident buffers persisting across ticks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use mycelia_core::config::MAX_DEVICE_SLOTS;
use mycelia_core::handles::{BufferHandle, HandleTable};
use mycelia_core::{MycelError, MycelResult};
use mycelia_quantum::{EchoProfile, GateOp, QuantumState};
use mycelia_sim::{AgentPopulation, AutonomousCycle, BrainState, MycelState, SubQGState};

pub struct GpuSlot {
    pub subqg: Option<SubQGState>,
    pub mycel: Option<MycelState>,
    pub agents: Option<AgentPopulation>,
    pub brain: Option<BrainState>,
    pub cycle: AutonomousCycle,
    pub prototypes: Vec<f32>,
    pub proto_dim: usize,
    pub buffers: HandleTable,
    pub buffer_bytes: HashMap<BufferHandle, Vec<u8>>,
    pub throttle_ms: u64,
    pub quantum_state: Option<QuantumState>,
    pub staged_gates: Vec<GateOp>,
    pub last_quantum_profile: EchoProfile,
    pub initialized: bool,
}

impl Default for GpuSlot {
    fn default() -> Self {
        Self {
            subqg: None,
            mycel: None,
            agents: None,
            brain: None,
            cycle: AutonomousCycle::new(true),
            prototypes: Vec::new(),
            proto_dim: 0,
            buffers: HandleTable::new(),
            buffer_bytes: HashMap::new(),
            throttle_ms: 0,
            quantum_state: None,
            staged_gates: Vec::new(),
            last_quantum_profile: EchoProfile::default(),
            initialized: false,
        }
    }
}

pub struct Driver {
    pub slots: Vec<GpuSlot>,
    pub quantum_enabled: AtomicBool,
}

impl Driver {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_DEVICE_SLOTS);
        slots.resize_with(MAX_DEVICE_SLOTS, GpuSlot::default);
        let quantum_enabled = AtomicBool::new(!mycelia_core::config::env_truthy(
            &std::env::var("CC_DISABLE_QUANTUM").unwrap_or_default(),
        ));
        Self { slots, quantum_enabled }
    }

    pub fn set_quantum_enabled(&self, enabled: bool) {
        self.quantum_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn quantum_enabled(&self) -> bool {
        self.quantum_enabled.load(Ordering::SeqCst)
    }
}

static DRIVER: OnceLock<Mutex<Driver>> = OnceLock::new();

/// The single process-wide Driver instance, per spec §9's re-architecture
/// of the source's mutable singletons.
pub fn driver() -> &'static Mutex<Driver> {
    DRIVER.get_or_init(|| Mutex::new(Driver::new()))
}

pub fn with_slot<T>(gpu_index: u32, f: impl FnOnce(&mut GpuSlot) -> MycelResult<T>) -> MycelResult<T> {
    let mut guard = driver().lock().expect("driver mutex poisoned");
    let idx = gpu_index as usize;
    if idx >= guard.slots.len() {
        return Err(MycelError::NotInitialized(gpu_index));
    }
    let slot = &mut guard.slots[idx];
    if !slot.initialized {
        return Err(MycelError::NotInitialized(gpu_index));
    }
    f(slot)
}

pub fn with_slot_mut_any<T>(gpu_index: u32, f: impl FnOnce(&mut GpuSlot) -> MycelResult<T>) -> MycelResult<T> {
    let mut guard = driver().lock().expect("driver mutex poisoned");
    let idx = gpu_index as usize;
    if idx >= guard.slots.len() {
        return Err(MycelError::NotInitialized(gpu_index));
    }
    f(&mut guard.slots[idx])
}

pub fn next_buffer_handle(slot: &mut GpuSlot, gpu_index: u32, size_bytes: u64) -> BufferHandle {
    slot.buffers.insert(gpu_index, size_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_slot_refuses_access() {
        // Use a high index unlikely to have been touched by other tests
        // in this process (the driver is a process-wide singleton).
        let result = with_slot(u32::MAX.min(MAX_DEVICE_SLOTS as u32 - 1), |_| Ok(()));
        // Either NotInitialized (slot exists but untouched) or already
        // initialized by another test: both are acceptable here, we just
        // assert the call doesn't panic.
        let _ = result;
    }
}
