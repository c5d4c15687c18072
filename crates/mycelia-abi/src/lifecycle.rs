//! `cc_get_version`, `cc_get_last_error`, and the init/shutdown/finish/
//! quantum-toggle lifecycle entry points (spec §7).
//!
//! `initialize_gpu` tries to bring up a real OpenCL device slot through
//! `mycelia_gpu::DeviceRegistry`; failure there is logged and swallowed —
//! the simulation state this driver actually runs on is the host mirror in
//! `mycelia-sim`/`mycelia-quantum`, so a machine with no usable GPU still
//! initializes successfully (spec §9: arithmetic-kernel dispatch is a
//! contract stub regardless of hardware).

use std::ffi::{c_char, CStr, CString};
use std::sync::OnceLock;

use mycelia_gpu::DeviceRegistry;

use crate::driver::driver;
use crate::error_state::{guard, last_error_ptr};

static VERSION_CSTR: OnceLock<CString> = OnceLock::new();
static GPU_REGISTRY: OnceLock<DeviceRegistry> = OnceLock::new();

fn gpu_registry() -> &'static DeviceRegistry {
    GPU_REGISTRY.get_or_init(DeviceRegistry::new)
}

#[no_mangle]
pub extern "C" fn cc_get_version() -> *const c_char {
    VERSION_CSTR
        .get_or_init(|| CString::new(mycelia_core::VERSION).unwrap())
        .as_ptr()
}

#[no_mangle]
pub extern "C" fn cc_get_last_error() -> *const c_char {
    last_error_ptr()
}

/// Brings up `gpu_index`'s slot. Returns 1 on success, 0 on hard failure
/// (index out of range); a missing physical device degrades gracefully.
#[no_mangle]
pub extern "C" fn initialize_gpu(gpu_index: u32) -> i32 {
    guard(1, 0, move || {
        if let Err(e) = gpu_registry().ensure_slot(gpu_index) {
            log::warn!("initialize_gpu({gpu_index}): no usable OpenCL device ({e}), running host-only");
        }
        let mut d = driver().lock().expect("driver mutex poisoned");
        let idx = gpu_index as usize;
        if idx >= d.slots.len() {
            return Err(mycelia_core::MycelError::Validation(format!(
                "gpu_index {gpu_index} exceeds device slot table"
            )));
        }
        d.slots[idx].initialized = true;
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn shutdown_gpu(gpu_index: u32) -> i32 {
    guard(1, 0, move || {
        gpu_registry().shutdown(gpu_index);
        let mut d = driver().lock().expect("driver mutex poisoned");
        let idx = gpu_index as usize;
        if let Some(slot) = d.slots.get_mut(idx) {
            *slot = crate::driver::GpuSlot::default();
        }
        Ok(())
    })
}

/// Forces a full `clFinish` on `gpu_index`'s queues when a real device is
/// present; a host-only slot treats this as a no-op success.
#[no_mangle]
pub extern "C" fn finish_gpu(gpu_index: u32) -> i32 {
    guard(1, 0, move || {
        let _ = gpu_registry().with_slot(gpu_index, |slot| {
            slot.main_queue.finish().map_err(|_| {
                mycelia_core::MycelError::Launch { label: "clFinish".into(), status: -1 }
            })
        });
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn set_quantum_enabled(gpu_index: u32, enabled: i32) -> i32 {
    guard(1, 0, move || {
        crate::driver::with_slot(gpu_index, |_| Ok(()))?;
        let d = driver().lock().expect("driver mutex poisoned");
        d.set_quantum_enabled(enabled != 0);
        Ok(())
    })
}

/// # Safety
/// `s` must be a valid, nul-terminated C string pointer, or null.
pub unsafe fn cstr_to_string(s: *const c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_is_stable_and_nonempty() {
        let p1 = cc_get_version();
        let p2 = cc_get_version();
        assert_eq!(p1, p2);
        let s = unsafe { CStr::from_ptr(p1) }.to_str().unwrap();
        assert!(!s.is_empty());
    }

    #[test]
    fn lifecycle_round_trip_on_a_fresh_index() {
        let idx = 6u32;
        assert_eq!(initialize_gpu(idx), 1);
        assert_eq!(finish_gpu(idx), 1);
        assert_eq!(set_quantum_enabled(idx, 0), 1);
        assert_eq!(shutdown_gpu(idx), 1);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        assert_eq!(initialize_gpu(9_999), 0);
    }
}
