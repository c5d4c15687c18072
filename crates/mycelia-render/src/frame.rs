//! CPU fallback render pipeline — spec §4.10.
//!
//! Mirrors `render_frame_buffer`/`render_debug_gradient` in
//! `mycelia-gpu/src/kernels/render.cl`: used when `MYCEL_SAFE_RENDER=1`
//! or when the GPU kernel path fails. Tiled dispatch is available via an
//! explicit tile height; the "auto-tile on small CU-count devices"
//! heuristic from the original driver is left disabled (spec §9 — tiling
//! caused artifacts on some drivers) even though this CPU path has no CU
//! count of its own, so the tiling entry point here is always
//! explicitly sized, never auto-selected.

use mycelia_core::{MycelError, MycelResult};
use rayon::prelude::*;

use crate::agents::{blend_trails_and_bodies, RenderAgent};
use crate::shade::{debug_gradient_cell, shade_cell, Rgba8};

pub struct RenderParams {
    pub w: usize,
    pub h: usize,
    pub exposure: f32,
    pub agent_radius: f32,
    pub tile_h: Option<usize>,
    pub clip_percentile: f32,
}

fn render_rows(field_map: &[f32], pheromone_rgb: &[f32], w: usize, row_start: usize, row_end: usize, exposure: f32, out: &mut [Rgba8]) {
    for y in row_start..row_end {
        for x in 0..w {
            let i = y * w + x;
            let height = field_map[i];
            let r = pheromone_rgb[i * 3];
            let g = pheromone_rgb[i * 3 + 1];
            let b = pheromone_rgb[i * 3 + 2];
            out[i - row_start * w] = shade_cell(height, r, g, b, exposure);
        }
    }
}

/// Renders one frame: SubQG height-field + pheromone overlay, then agent
/// trails/bodies blended on top, then a final percentile clip.
pub fn render_frame(
    field_map: &[f32],
    pheromone_rgb: &[f32],
    agents: &[RenderAgent],
    params: &RenderParams,
) -> MycelResult<Vec<Rgba8>> {
    let n = params.w * params.h;
    if field_map.len() != n || pheromone_rgb.len() != n * 3 {
        return Err(MycelError::Validation("field_map/pheromone_rgb length mismatch with W*H".into()));
    }

    let mut buf = vec![[0u8, 0, 0, 255]; n];

    match params.tile_h {
        Some(tile_h) if tile_h > 0 => {
            let tile_h = tile_h.min(params.h).max(1);
            buf.par_chunks_mut(tile_h * params.w).enumerate().for_each(|(tile_idx, chunk)| {
                let row_start = tile_idx * tile_h;
                let row_end = (row_start + tile_h).min(params.h);
                render_rows(field_map, pheromone_rgb, params.w, row_start, row_end, params.exposure, chunk);
            });
        }
        _ => render_rows(field_map, pheromone_rgb, params.w, 0, params.h, params.exposure, &mut buf),
    }

    blend_trails_and_bodies(&mut buf, params.w, params.h, agents, params.agent_radius, params.exposure);
    clip_to_percentile(&mut buf, params.clip_percentile);
    Ok(buf)
}

pub fn render_debug_gradient(w: usize, h: usize) -> Vec<Rgba8> {
    let mut buf = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            buf.push(debug_gradient_cell(x, y, w, h));
        }
    }
    buf
}

/// Clips each color channel to its `percentile`-th value across the
/// frame (spec §4.10: "Clip final channels to a percentile value").
fn clip_to_percentile(buf: &mut [Rgba8], percentile: f32) {
    if buf.is_empty() {
        return;
    }
    let percentile = percentile.clamp(0.0, 1.0);
    for c in 0..3 {
        let mut values: Vec<u8> = buf.iter().map(|px| px[c]).collect();
        values.sort_unstable();
        let idx = ((values.len() - 1) as f32 * percentile) as usize;
        let cap = values[idx];
        for px in buf.iter_mut() {
            if px[c] > cap {
                px[c] = cap;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_frame_produces_exactly_w_times_h_times_4_bytes_with_opaque_alpha() {
        let (w, h) = (8usize, 8usize);
        let field_map = vec![0.5f32; w * h];
        let pheromone = vec![0.1f32; w * h * 3];
        let params = RenderParams { w, h, exposure: 1.0, agent_radius: 0.05, tile_h: None, clip_percentile: 0.99 };
        let buf = render_frame(&field_map, &pheromone, &[], &params).unwrap();
        assert_eq!(buf.len(), w * h);
        assert!(buf.iter().all(|px| px[3] == 255));
    }

    #[test]
    fn tiled_and_untiled_renders_match() {
        let (w, h) = (16usize, 12usize);
        let field_map: Vec<f32> = (0..w * h).map(|i| (i as f32 / (w * h) as f32)).collect();
        let pheromone = vec![0.2f32; w * h * 3];
        let untiled = RenderParams { w, h, exposure: 1.0, agent_radius: 0.05, tile_h: None, clip_percentile: 1.0 };
        let tiled = RenderParams { w, h, exposure: 1.0, agent_radius: 0.05, tile_h: Some(4), clip_percentile: 1.0 };
        let a = render_frame(&field_map, &pheromone, &[], &untiled).unwrap();
        let b = render_frame(&field_map, &pheromone, &[], &tiled).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_mismatched_buffer_lengths() {
        let params = RenderParams { w: 4, h: 4, exposure: 1.0, agent_radius: 0.05, tile_h: None, clip_percentile: 1.0 };
        let field_map = vec![0.0f32; 4];
        let pheromone = vec![0.0f32; 4 * 3];
        assert!(render_frame(&field_map, &pheromone, &[], &params).is_err());
    }

    #[test]
    fn debug_gradient_has_correct_shape() {
        let buf = render_debug_gradient(32, 16);
        assert_eq!(buf.len(), 32 * 16);
    }
}
