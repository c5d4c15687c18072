//! Core types shared across the Mycelia GPU compute driver workspace.
//!
//! This crate owns nothing device-specific. It provides the error
//! taxonomy, opaque handle table, driver configuration, and the hashing
//! helper the kernel cache relies on, so that `mycelia-gpu`, `mycelia-sim`,
//! `mycelia-quantum`, `mycelia-render`, and `mycelia-abi` all agree on one
//! vocabulary.

pub mod config;
pub mod error;
pub mod hash;
pub mod handles;

pub use config::DriverConfig;
pub use error::{ClStatus, MycelError, MycelResult};
pub use handles::{BufferHandle, BufferMeta, HandleTable};

/// Crate version, surfaced by `cc_get_version` in the ABI.
pub const VERSION: &str = "1.0.0";
