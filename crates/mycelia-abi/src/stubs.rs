//! Link-compatible stubs for the explicitly out-of-scope collaborators —
//! spec §1 / §9: "their public entry points must continue to link and
//! return the 'not supported on this build' status if the core does not
//! ship them."
//!
//! Covers the VRAM sniffer, the "SDK" stream-cipher (SQSE) layer, the
//! standalone `main` demo, and the OpenCL error-string/platform-shim
//! helpers. None of these carry real logic; every entry point here sets
//! the thread-local error and returns the documented failure sentinel.

use std::ffi::c_char;

use crate::error_state::set_error;

const NOT_SUPPORTED: &str = "not supported on this build";

fn unsupported(op: &str) {
    set_error(&format!("{op}: {NOT_SUPPORTED}"));
}

/// Always fails: physical-memory sniffing is not shipped by this driver.
#[no_mangle]
pub extern "C" fn sniffer_map_device_memory(_gpu_index: u32) -> i32 {
    unsupported("sniffer_map_device_memory");
    0
}

#[no_mangle]
pub extern "C" fn sniffer_unmap_device_memory(_gpu_index: u32) -> i32 {
    unsupported("sniffer_unmap_device_memory");
    0
}

/// # Safety
/// `pattern` must point to `pattern_len` readable bytes if non-null.
#[no_mangle]
pub unsafe extern "C" fn sniffer_search_for_pattern(
    _gpu_index: u32,
    _pattern: *const u8,
    _pattern_len: u64,
    _out_offset: *mut u64,
) -> i32 {
    unsupported("sniffer_search_for_pattern");
    0
}

#[no_mangle]
pub extern "C" fn sniffer_last_hit_count(_gpu_index: u32) -> i64 {
    unsupported("sniffer_last_hit_count");
    -1
}

/// # Safety
/// `key`/`in_buf`/`out_buf` must point to `len` readable/writable bytes
/// respectively when non-null.
#[no_mangle]
pub unsafe extern "C" fn sqse_stream_cipher_apply(
    _key: *const u8,
    _key_len: u64,
    _in_buf: *const u8,
    _out_buf: *mut u8,
    _len: u64,
) -> i32 {
    unsupported("sqse_stream_cipher_apply");
    0
}

#[no_mangle]
pub extern "C" fn sqse_handshake(_peer_id: u32) -> i32 {
    unsupported("sqse_handshake");
    0
}

/// The source driver's standalone demo entry point. This library ships as
/// a driver, not a binary — callers linking against the historical `main`
/// symbol get a harmless no-op.
#[no_mangle]
pub extern "C" fn mycelia_standalone_main(_argc: i32, _argv: *const *const c_char) -> i32 {
    unsupported("mycelia_standalone_main");
    0
}

/// # Safety
/// The returned pointer is a static string; callers must not free it.
#[no_mangle]
pub extern "C" fn cl_error_to_string(_status: i32) -> *const c_char {
    static MSG: &[u8] = b"not supported on this build\0";
    MSG.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn platform_query_shim(_query_id: u32) -> i32 {
    unsupported("platform_query_shim");
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffer_and_sqse_stubs_fail_closed() {
        assert_eq!(sniffer_map_device_memory(0), 0);
        assert_eq!(sniffer_last_hit_count(0), -1);
        let ok = unsafe { sqse_stream_cipher_apply(std::ptr::null(), 0, std::ptr::null(), std::ptr::null_mut(), 0) };
        assert_eq!(ok, 0);
        assert_eq!(mycelia_standalone_main(0, std::ptr::null()), 0);
    }

    #[test]
    fn error_string_stub_returns_a_valid_c_string() {
        let ptr = cl_error_to_string(-30);
        assert!(!ptr.is_null());
    }
}
