//! Error taxonomy shared by every Mycelia crate.
//!
//! Mirrors the vocabulary in the driver's error-handling design: no device,
//! allocation, launch, validation, persistence, and abort/throttle buckets.
//! Every fallible core function returns [`MycelResult`]; the ABI layer is the
//! only place that squashes this into an `int` + thread-local string.

use thiserror::Error;

/// Opaque OpenCL status code, kept verbatim for diagnostics.
pub type ClStatus = i32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MycelError {
    #[error("no usable OpenCL platform/device found")]
    NoDevice,

    #[error("device lacks required capability: {0}")]
    Capability(String),

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("kernel launch failed ({label}): cl status {status}")]
    Launch { label: String, status: ClStatus },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("operation aborted")]
    Aborted,

    #[error("driver not initialized for gpu index {0}")]
    NotInitialized(u32),
}

impl MycelError {
    /// The taxonomy bucket name, used by the ABI layer's last-error string
    /// and by log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MycelError::NoDevice => "no_device",
            MycelError::Capability(_) => "capability",
            MycelError::Allocation(_) => "allocation",
            MycelError::Launch { .. } => "launch",
            MycelError::Validation(_) => "validation",
            MycelError::Persistence(_) => "persistence",
            MycelError::Aborted => "aborted",
            MycelError::NotInitialized(_) => "not_initialized",
        }
    }
}

pub type MycelResult<T> = Result<T, MycelError>;
