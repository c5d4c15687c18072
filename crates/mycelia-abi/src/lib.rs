//! Stable C ABI for the Mycelia compute driver — spec §6/§7/§9.
//!
//! This crate is the only place pointer/handle marshaling, panic
//! catching, and thread-local error state live; every other crate in the
//! workspace exposes ordinary `Result`-returning Rust APIs. See
//! `driver::Driver` for the process-wide singleton this facade wraps and
//! `error_state::guard` for the squash-to-int-plus-string boundary every
//! `#[no_mangle] extern "C"` function here goes through.

pub mod driver;
pub mod error_state;
pub mod kernels_stub;
pub mod lifecycle;
pub mod memory;
pub mod quantum_ffi;
pub mod render_ffi;
pub mod stubs;
pub mod subqg_mycel;

pub use driver::{driver, GpuSlot};
pub use error_state::{guard, last_error_ptr};
