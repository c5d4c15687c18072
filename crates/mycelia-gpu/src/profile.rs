//! Profiled enqueue helper — spec §4.2.
//!
//! Every kernel launch goes through [`profiled_enqueue`], which optionally
//! waits for completion, reads the CL `COMMAND_START`/`COMMAND_END`
//! profiling timestamps, feeds the observed duration into the
//! [`NoiseController`], and applies the global throttle.

use std::thread::sleep;
use std::time::Duration;

use mycelia_core::{MycelError, MycelResult};
use ocl::enums::ProfilingInfo;
use ocl::{Event, Kernel, SpatialDims};

use crate::compiler::ocl_status;
use crate::noise::NoiseController;

#[derive(Debug, Clone, Copy, Default)]
pub struct KernelMetrics {
    pub duration_ms: f64,
    pub error: f32,
    pub variance: f32,
}

#[derive(Debug, Clone)]
pub struct LastMetrics {
    pub name: String,
    pub metrics: KernelMetrics,
}

/// Throttle scope: apply the sleep globally, or only when the calling
/// gpu index matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleScope {
    Global,
    Device(u32),
}

pub struct EnqueueOptions<'a> {
    pub label: &'a str,
    pub force_finish: bool,
    pub throttle_ms: u64,
    pub throttle_scope: ThrottleScope,
    pub this_gpu_index: u32,
}

/// Enqueues `kernel` over `global_work_size` (with optional `local_work_size`),
/// profiles it when `opts.force_finish` is set, updates `noise`, and applies
/// the throttle. Returns the observed metrics.
pub fn profiled_enqueue(
    kernel: &Kernel,
    global_work_size: SpatialDims,
    local_work_size: Option<SpatialDims>,
    noise: &mut NoiseController,
    opts: &EnqueueOptions,
) -> MycelResult<KernelMetrics> {
    let mut event = Event::empty();
    unsafe {
        let mut builder = kernel.cmd().gws(global_work_size).enew(&mut event);
        if let Some(lws) = local_work_size {
            builder = builder.lws(lws);
        }
        builder.enq().map_err(|e| MycelError::Launch {
            label: opts.label.to_string(),
            status: ocl_status(&e),
        })?;
    }

    let metrics = if opts.force_finish {
        event.wait_for().map_err(|e| MycelError::Launch {
            label: opts.label.to_string(),
            status: ocl_status(&e),
        })?;
        let start = event
            .profiling_info(ProfilingInfo::Start)
            .map_err(|e| MycelError::Launch {
                label: opts.label.to_string(),
                status: ocl_status(&e),
            })?
            .time()
            .unwrap_or(0);
        let end = event
            .profiling_info(ProfilingInfo::End)
            .map_err(|e| MycelError::Launch {
                label: opts.label.to_string(),
                status: ocl_status(&e),
            })?
            .time()
            .unwrap_or(0);
        let duration_ms = (end.saturating_sub(start)) as f64 * 1e-6;
        let variance = ((duration_ms * 1e-3) as f32 * noise.noise_factor).max(1e-6);
        noise.update(variance);
        let error = 0.5 * (variance - 1.0).abs();
        KernelMetrics {
            duration_ms,
            error,
            variance,
        }
    } else {
        KernelMetrics::default()
    };

    if opts.throttle_ms > 0 {
        let applies = match opts.throttle_scope {
            ThrottleScope::Global => true,
            ThrottleScope::Device(idx) => idx == opts.this_gpu_index,
        };
        if applies {
            sleep(Duration::from_millis(opts.throttle_ms));
        }
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_derivation_matches_spec_formula() {
        let variance = 1.3f32;
        let error = 0.5 * (variance - 1.0).abs();
        assert!((error - 0.15).abs() < 1e-6);
    }
}
