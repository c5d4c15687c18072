//! Thread-local last-error mirroring — spec §7 / §9 Design Notes:
//! "Thread-local globals... replace with an explicit handle/context
//! passed through the core; the ABI wrapper owns the thread-local
//! mirroring." The core returns `Result`s; only this FFI layer squashes
//! them to an int + a thread-local string.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::new("OK").unwrap());
}

pub fn clear_error() {
    set_error("OK");
}

pub fn set_error(msg: &str) {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = CString::new(msg.replace('\0', "")).unwrap_or_else(|_| CString::new("error").unwrap());
    });
}

pub fn set_error_from_mycel(err: &mycelia_core::MycelError) {
    set_error(&format!("[{}] {}", err.kind(), err));
}

/// Returns a pointer valid until the next error on this thread.
pub fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|cell| cell.borrow().as_ptr())
}

/// Runs `f`, clearing the error on success and recording it (plus
/// catching panics as an "Aborted"-style internal error) on failure.
/// Returns `ok_value` on success, `err_value` otherwise.
pub fn guard<T>(ok_value: T, err_value: T, f: impl FnOnce() -> mycelia_core::MycelResult<()>) -> T {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(Ok(())) => {
            clear_error();
            ok_value
        }
        Ok(Err(e)) => {
            set_error_from_mycel(&e);
            err_value
        }
        Err(_) => {
            set_error("internal panic");
            err_value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_clears_error_on_success() {
        set_error("stale");
        let r = guard(1, 0, || Ok(()));
        assert_eq!(r, 1);
    }

    #[test]
    fn guard_records_error_on_failure() {
        let r = guard(1i32, 0i32, || Err(mycelia_core::MycelError::Aborted));
        assert_eq!(r, 0);
        let msg = unsafe { std::ffi::CStr::from_ptr(last_error_ptr()) }.to_str().unwrap();
        assert!(msg.contains("aborted") || msg.to_lowercase().contains("abort"));
    }
}
