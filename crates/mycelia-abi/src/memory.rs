//! `allocate_gpu_memory` / `free_gpu_memory` / blocking host<->device
//! transfer entry points (spec §7).
//!
//! Buffers are tracked in a `HandleTable` and backed by a plain `Vec<u8>`
//! per handle rather than a live OpenCL allocation — the compute state
//! this driver actually steps (SubQG/mycel/agent/brain/quantum) lives in
//! typed host structs, so these handles exist to give callers the same
//! opaque-pointer-free buffer lifecycle the Design Notes call for (spec
//! §9: "opaque handle table instead of pointer casting").

use mycelia_core::handles::BufferHandle;
use mycelia_core::MycelError;

use crate::driver::with_slot;
use crate::error_state::guard;

#[no_mangle]
pub extern "C" fn allocate_gpu_memory(gpu_index: u32, size_bytes: u64) -> u64 {
    let mut handle = 0u64;
    let result = with_slot(gpu_index, |slot| {
        if size_bytes == 0 {
            return Err(MycelError::Validation("allocation size must be > 0".into()));
        }
        let h = slot.buffers.insert(gpu_index, size_bytes);
        slot.buffer_bytes.insert(h, vec![0u8; size_bytes as usize]);
        handle = h.0;
        Ok(())
    });
    match result {
        Ok(()) => handle,
        Err(_) => 0,
    }
}

#[no_mangle]
pub extern "C" fn free_gpu_memory(gpu_index: u32, handle: u64) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let h = BufferHandle(handle);
            slot.buffers
                .remove(h)
                .ok_or_else(|| MycelError::Validation(format!("unknown buffer handle {handle}")))?;
            slot.buffer_bytes.remove(&h);
            Ok(())
        })
    })
}

/// # Safety
/// `src` must point to at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn write_host_to_gpu_blocking(
    gpu_index: u32,
    handle: u64,
    src: *const u8,
    len: u64,
) -> i32 {
    guard(1, 0, move || {
        if src.is_null() {
            return Err(MycelError::Validation("src pointer is null".into()));
        }
        let bytes = std::slice::from_raw_parts(src, len as usize);
        with_slot(gpu_index, |slot| {
            let h = BufferHandle(handle);
            let meta = slot.buffers.get(h).ok_or_else(|| MycelError::Validation(format!("unknown buffer handle {handle}")))?;
            if meta.size_bytes < len {
                return Err(MycelError::Validation(format!(
                    "write of {len} bytes exceeds buffer size {}",
                    meta.size_bytes
                )));
            }
            let buf = slot
                .buffer_bytes
                .get_mut(&h)
                .ok_or_else(|| MycelError::Validation("buffer handle has no backing storage".into()))?;
            buf[..bytes.len()].copy_from_slice(bytes);
            Ok(())
        })
    })
}

/// # Safety
/// `dst` must point to at least `len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn read_gpu_to_host_blocking(
    gpu_index: u32,
    handle: u64,
    dst: *mut u8,
    len: u64,
) -> i32 {
    guard(1, 0, move || {
        if dst.is_null() {
            return Err(MycelError::Validation("dst pointer is null".into()));
        }
        with_slot(gpu_index, |slot| {
            let h = BufferHandle(handle);
            let buf = slot
                .buffer_bytes
                .get(&h)
                .ok_or_else(|| MycelError::Validation(format!("unknown buffer handle {handle}")))?;
            let n = (len as usize).min(buf.len());
            std::ptr::copy_nonoverlapping(buf.as_ptr(), dst, n);
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::initialize_gpu;

    #[test]
    fn allocate_write_read_free_round_trip() {
        let idx = 5u32;
        assert_eq!(initialize_gpu(idx), 1);
        let handle = allocate_gpu_memory(idx, 16);
        assert_ne!(handle, 0);

        let src = [1u8, 2, 3, 4];
        let ok = unsafe { write_host_to_gpu_blocking(idx, handle, src.as_ptr(), src.len() as u64) };
        assert_eq!(ok, 1);

        let mut dst = [0u8; 4];
        let ok = unsafe { read_gpu_to_host_blocking(idx, handle, dst.as_mut_ptr(), dst.len() as u64) };
        assert_eq!(ok, 1);
        assert_eq!(dst, src);

        assert_eq!(free_gpu_memory(idx, handle), 1);
        assert_eq!(free_gpu_memory(idx, handle), 0);
    }

    #[test]
    fn allocate_zero_bytes_is_rejected() {
        let idx = 5u32;
        assert_eq!(initialize_gpu(idx), 1);
        assert_eq!(allocate_gpu_memory(idx, 0), 0);
    }
}
