//! Device registry, kernel compiler/cache, profiled dispatcher for the
//! Mycelia GPU compute driver (spec §2, "THE CORE" items i, vi).
//!
//! This crate owns nothing about SubQG/Mycel/agent/quantum *semantics* —
//! those live in `mycelia-sim` and `mycelia-quantum`. It owns the OpenCL
//! plumbing those crates dispatch through: device slots, kernel binaries,
//! the profiled-enqueue helper, the noise controller, and the generic
//! command dispatcher.

pub mod compiler;
pub mod dispatch;
pub mod kernels;
pub mod noise;
pub mod profile;
pub mod registry;

pub use compiler::{build_options, compile_kernel, KernelVariant, ProgramCache};
pub use dispatch::{DispatchShape, Dispatcher, KernelCommand, ReductionParams};
pub use noise::NoiseController;
pub use profile::{EnqueueOptions, KernelMetrics, LastMetrics, ThrottleScope};
pub use registry::{DeviceRegistry, DeviceSlot};
