//! Embedded OpenCL C kernel sources for the in-scope kernels (spec §2
//! "the core"). The arithmetic-kernel zoo is out of scope and never gets a
//! real source string here — its dispatch is exercised through
//! `KernelCommand::Arithmetic` in [`crate::dispatch`].

pub const SUBQG_STEP: &str = include_str!("kernels/subqg_step.cl");
pub const MYCEL: &str = include_str!("kernels/mycel.cl");
pub const BRAIN: &str = include_str!("kernels/brain.cl");
pub const AGENT: &str = include_str!("kernels/agent.cl");
pub const RENDER: &str = include_str!("kernels/render.cl");

/// All in-scope kernel source bundles, for bulk compilation at slot init.
pub const ALL_BUNDLES: &[(&str, &str)] = &[
    ("subqg_step", SUBQG_STEP),
    ("mycel", MYCEL),
    ("brain", BRAIN),
    ("agent", AGENT),
    ("render", RENDER),
];
