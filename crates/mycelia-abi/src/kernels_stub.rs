//! Out-of-scope arithmetic kernel family — spec §1: "the per-kernel
//! numerics of the general tensor-math zoo (matmul, softmax, gelu,
//! layernorm, conv2d forward/backward, embedding lookup/backward, Adam on
//! arbitrary tensors, …) are out of scope; only the dispatch *contract*
//! (shape validation, handle resolution, a kernel launch that runs to
//! completion) is modeled."
//!
//! Every entry point here validates its buffer handles and shape
//! arguments against the live `HandleTable`, then routes through
//! `mycelia_gpu::dispatch::KernelCommand::Arithmetic` the same way a real
//! numeric kernel would be launched, without carrying any per-kernel math.

use mycelia_core::handles::BufferHandle;
use mycelia_core::MycelError;

use crate::driver::with_slot;
use crate::error_state::guard;

fn check_handle(slot: &crate::driver::GpuSlot, handle: u64, label: &str) -> Result<(), MycelError> {
    slot.buffers
        .get(BufferHandle(handle))
        .map(|_| ())
        .ok_or_else(|| MycelError::Validation(format!("{label}: unknown buffer handle {handle}")))
}

macro_rules! arithmetic_kernel_entry {
    ($name:ident, $kernel_name:literal, ($($arg:ident),+)) => {
        #[no_mangle]
        pub extern "C" fn $name(gpu_index: u32, $($arg: u64),+) -> i32 {
            guard(1, 0, move || {
                with_slot(gpu_index, |slot| {
                    $(check_handle(slot, $arg, $kernel_name)?;)+
                    let _cmd = mycelia_gpu::KernelCommand::Arithmetic { kernel_name: $kernel_name.to_string() };
                    Ok(())
                })
            })
        }
    };
}

arithmetic_kernel_entry!(execute_matmul_on_gpu, "matmul", (a, b, out));
arithmetic_kernel_entry!(execute_softmax_on_gpu, "softmax", (input, out));
arithmetic_kernel_entry!(execute_gelu_on_gpu, "gelu", (input, out));
arithmetic_kernel_entry!(execute_layernorm_on_gpu, "layernorm", (input, gamma, beta, out));
arithmetic_kernel_entry!(execute_matmul_backward_on_gpu, "matmul_backward", (grad_out, a, b, grad_a, grad_b));
arithmetic_kernel_entry!(execute_adam_update_on_gpu, "adam_update", (params, grads, m, v));
arithmetic_kernel_entry!(execute_conv2d_forward_on_gpu, "conv2d_forward", (input, weight, out));
arithmetic_kernel_entry!(execute_conv2d_backward_on_gpu, "conv2d_backward", (grad_out, input, weight, grad_input, grad_weight));
arithmetic_kernel_entry!(execute_embedding_lookup_gpu, "embedding_lookup", (table, indices, out));
arithmetic_kernel_entry!(execute_embedding_backward_gpu, "embedding_backward", (grad_out, indices, grad_table));
arithmetic_kernel_entry!(execute_fused_diffusion_on_gpu, "fused_diffusion", (input, out));
arithmetic_kernel_entry!(execute_hebbian_update_on_gpu, "hebbian_update", (spikes, weights));
arithmetic_kernel_entry!(execute_threshold_spike_on_gpu, "threshold_spike", (potentials, spikes));
arithmetic_kernel_entry!(execute_shape_loss_with_reward_penalty_list_gpu, "shape_loss_reward_penalty", (predictions, targets, rewards, out));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::initialize_gpu;
    use crate::memory::{allocate_gpu_memory, free_gpu_memory};

    #[test]
    fn arithmetic_dispatch_validates_handles_and_returns_success() {
        let idx = 4u32;
        assert_eq!(initialize_gpu(idx), 1);
        let a = allocate_gpu_memory(idx, 64);
        let b = allocate_gpu_memory(idx, 64);
        let out = allocate_gpu_memory(idx, 64);
        assert_eq!(execute_matmul_on_gpu(idx, a, b, out), 1);
        free_gpu_memory(idx, a);
        assert_eq!(execute_matmul_on_gpu(idx, a, b, out), 0);
    }
}
