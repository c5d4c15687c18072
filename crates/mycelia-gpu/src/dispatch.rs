//! Universal kernel dispatcher, `submit_kernel_command` — spec §4.3.
//!
//! One command enum plus one struct per command, validated and bound in a
//! fixed argument order, then launched through [`profiled_enqueue`]. The
//! individual arithmetic kernels (matmul, softmax, Adam, …) are out of
//! scope per `spec.md` §1 — only their dispatch *contract* is modeled here
//! via [`KernelCommand::Arithmetic`], which validates shapes and launches a
//! named kernel without carrying its numerics.

use mycelia_core::{MycelError, MycelResult};
use ocl::{Buffer, Kernel, SpatialDims};

use crate::noise::NoiseController;
use crate::profile::{profiled_enqueue, EnqueueOptions, KernelMetrics, ThrottleScope};
use crate::registry::DeviceSlot;

/// Logical dispatch commands. The arithmetic-kernel zoo (matmul, softmax,
/// gelu, layernorm, conv2d forward/backward, embedding lookup/backward,
/// fused diffusion, threshold-spike, …) is represented once via
/// [`KernelCommand::Arithmetic`] carrying the kernel name, since only the
/// dispatch contract — not the per-kernel numerics — is in scope.
#[derive(Debug, Clone)]
pub enum KernelCommand {
    SubqgStep,
    MycelReinforce,
    MycelDiffuseDecay,
    MycelNutrient,
    MycelColonyUpdate,
    AgentPolicyStep,
    AdamUpdate,
    BrainBridgeCycle,
    IzhikevichStep,
    SocialHebbian,
    RenderImage,
    RenderBuffer,
    RenderDebugGradient,
    /// `PROTO_SEGMENTED_SUM`-style reduction; requires 32-bit atomics.
    ProtoSegmentedSum,
    /// `LINGUISTIC_PHEROMONE_REINFORCE`-style atomic accumulate.
    LinguisticPheromoneReinforce,
    /// Out-of-scope arithmetic kernel dispatch contract only.
    Arithmetic { kernel_name: String },
}

impl KernelCommand {
    /// Commands that require 32-bit global atomics; refused otherwise
    /// (spec §4.3).
    pub fn requires_atomics32(&self) -> bool {
        matches!(
            self,
            KernelCommand::ProtoSegmentedSum | KernelCommand::LinguisticPheromoneReinforce
        )
    }

    pub fn kernel_name(&self) -> &str {
        match self {
            KernelCommand::SubqgStep => "subqg_simulation_step",
            KernelCommand::MycelReinforce => "mycel_pheromone_reinforce",
            KernelCommand::MycelDiffuseDecay => "mycel_pheromone_diffuse_decay",
            KernelCommand::MycelNutrient => "mycel_nutrient_update",
            KernelCommand::MycelColonyUpdate => "mycel_colony_update",
            KernelCommand::AgentPolicyStep => "genetic_agent_kernel",
            KernelCommand::AdamUpdate => "adam_update_kernel",
            KernelCommand::BrainBridgeCycle => "brain_bridge_cycle",
            KernelCommand::IzhikevichStep => "izhikevich_step",
            KernelCommand::SocialHebbian => "social_hebbian_update",
            KernelCommand::RenderImage => "render_frame_image",
            KernelCommand::RenderBuffer => "render_frame_buffer",
            KernelCommand::RenderDebugGradient => "render_debug_gradient",
            KernelCommand::ProtoSegmentedSum => "proto_segmented_sum",
            KernelCommand::LinguisticPheromoneReinforce => "linguistic_pheromone_reinforce",
            KernelCommand::Arithmetic { kernel_name } => kernel_name,
        }
    }
}

/// Work sizing for one dispatch: a 1-D global size plus whether this is a
/// reduction (which routes through [`reduction_params`]).
pub struct DispatchShape {
    pub global_size: usize,
    pub is_reduction: bool,
    pub accumulator_is_f64: bool,
}

/// LWS/local-memory sizing for reduction kernels (spec §4.3): LWS=256
/// clamped to the device max, local memory sized for the accumulator type,
/// refused if it exceeds `CL_DEVICE_LOCAL_MEM_SIZE`.
pub struct ReductionParams {
    pub local_work_size: usize,
    pub local_mem_bytes: usize,
}

pub fn reduction_params(
    max_work_group_size: usize,
    local_mem_size_bytes: usize,
    accumulator_is_f64: bool,
) -> MycelResult<ReductionParams> {
    let lws = 256usize.min(max_work_group_size.max(1));
    let elem_size = if accumulator_is_f64 { 8 } else { 4 };
    let local_mem_bytes = lws * elem_size;
    if local_mem_bytes > local_mem_size_bytes {
        return Err(MycelError::Validation(format!(
            "reduction local memory {local_mem_bytes} exceeds device limit {local_mem_size_bytes}"
        )));
    }
    Ok(ReductionParams {
        local_work_size: lws,
        local_mem_bytes,
    })
}

/// Validate, bind, and launch one [`KernelCommand`] against buffers already
/// resident on `slot`. Zero-sized-but-well-formed calls succeed trivially
/// without touching the queue (spec §4.3 step 1).
pub struct Dispatcher<'a> {
    pub slot: &'a mut DeviceSlot,
    pub noise: &'a mut NoiseController,
    pub throttle_ms: u64,
    pub throttle_scope: ThrottleScope,
    pub gpu_index: u32,
    pub force_finish: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn submit_kernel_command<F>(
        &mut self,
        cmd: &KernelCommand,
        shape: DispatchShape,
        fast_math: bool,
        bind_args: F,
    ) -> MycelResult<KernelMetrics>
    where
        F: FnOnce(&Kernel) -> MycelResult<()>,
    {
        if cmd.requires_atomics32() && !self.slot.has_atomics32 {
            return Err(MycelError::Capability(format!(
                "{} requires 32-bit global atomics",
                cmd.kernel_name()
            )));
        }
        if shape.global_size == 0 {
            // Zero-sized but well-formed: succeed trivially (spec §4.3 step 1).
            return Ok(KernelMetrics::default());
        }

        let variant = self
            .slot
            .programs
            .get(cmd.kernel_name(), fast_math)
            .or_else(|| self.slot.programs.get(cmd.kernel_name(), false))
            .ok_or_else(|| {
                MycelError::Validation(format!("kernel {} not compiled", cmd.kernel_name()))
            })?
            .clone();

        let kernel = variant.build(self.slot.main_queue.clone())?;
        bind_args(&kernel).map_err(|e| match e {
            MycelError::Validation(msg) => MycelError::Validation(format!(
                "{}: arg bind failed: {msg}",
                cmd.kernel_name()
            )),
            other => other,
        })?;

        let lws = if shape.is_reduction {
            let max_wg = 1024usize; // queried from the device in a real build.
            let local_mem_limit = 32 * 1024usize;
            Some(SpatialDims::One(
                reduction_params(max_wg, local_mem_limit, shape.accumulator_is_f64)?
                    .local_work_size,
            ))
        } else {
            None
        };

        let opts = EnqueueOptions {
            label: cmd.kernel_name(),
            force_finish: self.force_finish,
            throttle_ms: self.throttle_ms,
            throttle_scope: self.throttle_scope,
            this_gpu_index: self.gpu_index,
        };

        profiled_enqueue(
            &kernel,
            SpatialDims::One(shape.global_size),
            lws,
            self.noise,
            &opts,
        )
    }
}

/// Bind a buffer argument, translating OpenCL errors into a labelled
/// validation error per argument position (spec §4.3 step 3).
pub fn set_buffer_arg<T: ocl::OclPrm>(
    kernel: &Kernel,
    index: u32,
    label: &str,
    buffer: &Buffer<T>,
) -> MycelResult<()> {
    kernel
        .set_arg(index, buffer)
        .map_err(|e| MycelError::Validation(format!("arg[{index}] ({label}): {e}")))
}

pub fn set_scalar_arg<T: ocl::OclPrm>(
    kernel: &Kernel,
    index: u32,
    label: &str,
    value: T,
) -> MycelResult<()> {
    kernel
        .set_arg(index, value)
        .map_err(|e| MycelError::Validation(format!("arg[{index}] ({label}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_dispatch_refused_only_for_atomics_gate() {
        let cmd = KernelCommand::ProtoSegmentedSum;
        assert!(cmd.requires_atomics32());
        let cmd2 = KernelCommand::SubqgStep;
        assert!(!cmd2.requires_atomics32());
    }

    #[test]
    fn reduction_params_clamp_lws_and_size_local_mem() {
        let p = reduction_params(128, 4096, false).unwrap();
        assert_eq!(p.local_work_size, 128);
        assert_eq!(p.local_mem_bytes, 128 * 4);

        let p64 = reduction_params(1024, 1 << 20, true).unwrap();
        assert_eq!(p64.local_work_size, 256);
        assert_eq!(p64.local_mem_bytes, 256 * 8);
    }

    #[test]
    fn reduction_params_rejects_oversized_local_mem() {
        let err = reduction_params(1024, 16, true);
        assert!(err.is_err());
    }
}
