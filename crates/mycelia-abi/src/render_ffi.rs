//! CPU fallback frame rendering — spec §4.10 / §7's `render_frame_to_buffer`.
//!
//! Pulls the SubQG height field and a per-cell pheromone color directly
//! out of the slot's resident host state rather than requiring the
//! caller to stage them as separate GPU buffers first: the mycel grid is
//! assumed to be laid out one cell per SubQG grid cell, averaging each
//! cell's edges down to the first three pheromone channels as RGB.

use mycelia_core::MycelError;
use mycelia_render::{render_frame, RenderAgent, RenderParams};
use mycelia_sim::MycelState;

use crate::driver::with_slot;
use crate::error_state::guard;

fn build_pheromone_rgb(mycel: &MycelState, n_cells: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; n_cells * 3];
    let channels = mycel.c.min(3);
    for cell in 0..n_cells.min(mycel.t_cap) {
        for ch in 0..channels {
            let mut sum = 0.0f32;
            for k in 0..mycel.k {
                sum += mycel.pheromone[cell * mycel.k * mycel.c + k * mycel.c + ch];
            }
            out[cell * 3 + ch] = (sum / mycel.k.max(1) as f32).clamp(0.0, 1.0);
        }
    }
    out
}

/// Renders the SubQG/mycel/agent state resident in `gpu_index` to an
/// `RGBA8` buffer. `agent_xy`/`trail_xy` are flat `(x, y)` pairs in
/// `[0, 1]` normalized coordinates; `trail_counts[i]` gives the number of
/// trail points belonging to agent `i`, consumed in order from
/// `trail_xy`.
///
/// # Safety
/// `out_rgba8` must point to at least `w * h * 4` writable bytes.
/// `agent_xy`/`agent_hue` must point to `n_agents` entries;
/// `trail_xy` to `sum(trail_counts)` `(f32, f32)` pairs and
/// `trail_counts` to `n_agents` entries.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn render_frame_to_buffer(
    gpu_index: u32,
    w: u32,
    h: u32,
    out_rgba8: *mut u8,
    agent_xy: *const f32,
    agent_hue: *const f32,
    n_agents: u32,
    trail_xy: *const f32,
    trail_counts: *const u32,
    exposure: f32,
    agent_radius: f32,
    clip_percentile: f32,
) -> i32 {
    guard(1, 0, move || {
        if out_rgba8.is_null() {
            return Err(MycelError::Validation("out_rgba8 is null".into()));
        }
        let n = (w as usize) * (h as usize);

        let agents = if n_agents == 0 {
            Vec::new()
        } else {
            if agent_xy.is_null() || agent_hue.is_null() {
                return Err(MycelError::Validation("agent_xy/agent_hue must be non-null when n_agents > 0".into()));
            }
            let xy = std::slice::from_raw_parts(agent_xy, n_agents as usize * 2);
            let hue = std::slice::from_raw_parts(agent_hue, n_agents as usize);
            let counts = if trail_counts.is_null() {
                vec![0u32; n_agents as usize]
            } else {
                std::slice::from_raw_parts(trail_counts, n_agents as usize).to_vec()
            };
            let mut cursor = 0usize;
            let mut out = Vec::with_capacity(n_agents as usize);
            for i in 0..n_agents as usize {
                let count = counts[i] as usize;
                let trail = if count == 0 || trail_xy.is_null() {
                    Vec::new()
                } else {
                    let slice = std::slice::from_raw_parts(trail_xy.add(cursor * 2), count * 2);
                    slice.chunks_exact(2).map(|p| (p[0], p[1])).collect()
                };
                cursor += count;
                out.push(RenderAgent { x: xy[i * 2], y: xy[i * 2 + 1], hue: hue[i], trail });
            }
            out
        };

        with_slot(gpu_index, |slot| {
            let subqg = slot.subqg.as_ref().ok_or_else(|| MycelError::Validation("no SubQG state resident".into()))?;
            if subqg.w != w as usize || subqg.h != h as usize {
                return Err(MycelError::Validation(format!(
                    "requested frame {w}x{h} does not match resident SubQG grid {}x{}",
                    subqg.w, subqg.h
                )));
            }
            let pheromone_rgb = match slot.mycel.as_ref() {
                Some(mycel) => build_pheromone_rgb(mycel, n),
                None => vec![0.0f32; n * 3],
            };
            let params = RenderParams {
                w: w as usize,
                h: h as usize,
                exposure,
                agent_radius,
                tile_h: None,
                clip_percentile,
            };
            let buf = render_frame(&subqg.field_map, &pheromone_rgb, &agents, &params)?;
            let bytes: &[u8] = std::slice::from_raw_parts(buf.as_ptr() as *const u8, buf.len() * 4);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), out_rgba8, bytes.len());
            Ok(())
        })
    })
}

/// # Safety
/// `out_rgba8` must point to at least `w * h * 4` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn render_debug_gradient_to_buffer(w: u32, h: u32, out_rgba8: *mut u8) -> i32 {
    guard(1, 0, move || {
        if out_rgba8.is_null() {
            return Err(MycelError::Validation("out_rgba8 is null".into()));
        }
        let buf = mycelia_render::render_debug_gradient(w as usize, h as usize);
        let bytes: &[u8] = std::slice::from_raw_parts(buf.as_ptr() as *const u8, buf.len() * 4);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), out_rgba8, bytes.len());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::initialize_gpu;
    use crate::subqg_mycel::{subqg_inject_agents, subqg_init_mycel, subqg_initialize_state};

    #[test]
    fn renders_a_full_opaque_frame_with_agents() {
        let idx = 30u32;
        let (w, h) = (8u32, 8u32);
        assert_eq!(initialize_gpu(idx), 1);
        assert_eq!(subqg_initialize_state(idx, w, h, 0.1, 0.5, 1, 42), 1);
        assert_eq!(subqg_init_mycel(idx, w * h, 3, 4, w * h, 7), 1);
        assert_eq!(subqg_inject_agents(idx, 2, 9), 1);

        let mut buf = vec![0u8; (w * h * 4) as usize];
        let agent_xy = [0.25f32, 0.25, 0.75, 0.75];
        let agent_hue = [0.0f32, 0.5];
        let ok = unsafe {
            render_frame_to_buffer(
                idx,
                w,
                h,
                buf.as_mut_ptr(),
                agent_xy.as_ptr(),
                agent_hue.as_ptr(),
                2,
                std::ptr::null(),
                std::ptr::null(),
                1.0,
                0.05,
                1.0,
            )
        };
        assert_eq!(ok, 1);
        for px in buf.chunks_exact(4) {
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn rejects_mismatched_grid_dimensions() {
        let idx = 31u32;
        assert_eq!(initialize_gpu(idx), 1);
        assert_eq!(subqg_initialize_state(idx, 8, 8, 0.1, 0.5, 1, 1), 1);
        let mut buf = vec![0u8; 16 * 16 * 4];
        let ok = unsafe {
            render_frame_to_buffer(
                idx,
                16,
                16,
                buf.as_mut_ptr(),
                std::ptr::null(),
                std::ptr::null(),
                0,
                std::ptr::null(),
                std::ptr::null(),
                1.0,
                0.05,
                1.0,
            )
        };
        assert_eq!(ok, 0);
    }

    #[test]
    fn debug_gradient_buffer_fills_expected_size() {
        let mut buf = vec![0u8; 32 * 16 * 4];
        let ok = unsafe { render_debug_gradient_to_buffer(32, 16, buf.as_mut_ptr()) };
        assert_eq!(ok, 1);
    }
}
