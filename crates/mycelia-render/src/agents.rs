//! Agent trail and body blending — spec §4.10: "Blend agent trails as
//! alpha-weighted discs along polylines, then agent bodies as
//! anti-aliased discs with hue from agent."

use crate::shade::Rgba8;

pub struct RenderAgent {
    /// Normalized position in `[0, 1]`.
    pub x: f32,
    pub y: f32,
    pub hue: f32,
    /// Normalized trail positions, oldest first.
    pub trail: Vec<(f32, f32)>,
}

fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue.rem_euclid(1.0) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

fn blend_pixel(buf: &mut [Rgba8], w: usize, h: usize, px: i64, py: i64, color: [f32; 3], alpha: f32) {
    if px < 0 || py < 0 || px as usize >= w || py as usize >= h || alpha <= 0.0 {
        return;
    }
    let idx = py as usize * w + px as usize;
    let dst = &mut buf[idx];
    for c in 0..3 {
        let existing = dst[c] as f32 / 255.0;
        let blended = existing * (1.0 - alpha) + color[c] * alpha;
        dst[c] = (blended.clamp(0.0, 1.0) * 255.0) as u8;
    }
}

/// Alpha-weighted, anti-aliased disc centered at normalized `(cx, cy)`.
fn blend_disc(buf: &mut [Rgba8], w: usize, h: usize, cx: f32, cy: f32, radius: f32, color: [f32; 3], peak_alpha: f32) {
    let px_radius = (radius * w.max(h) as f32).max(1.0);
    let cx_px = cx * w as f32;
    let cy_px = cy * h as f32;
    let r_ceil = px_radius.ceil() as i64;
    let min_x = (cx_px as i64 - r_ceil).max(0);
    let max_x = (cx_px as i64 + r_ceil).min(w as i64 - 1);
    let min_y = (cy_px as i64 - r_ceil).max(0);
    let max_y = (cy_px as i64 + r_ceil).min(h as i64 - 1);

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let dx = px as f32 + 0.5 - cx_px;
            let dy = py as f32 + 0.5 - cy_px;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > px_radius {
                continue;
            }
            // Soft edge over the outer 1px for anti-aliasing.
            let edge = (px_radius - dist).clamp(0.0, 1.0);
            blend_pixel(buf, w, h, px, py, color, peak_alpha * edge);
        }
    }
}

pub fn blend_trails_and_bodies(buf: &mut [Rgba8], w: usize, h: usize, agents: &[RenderAgent], radius: f32, exposure: f32) {
    for agent in agents {
        let color = hue_to_rgb(agent.hue).map(|c| (c * exposure).clamp(0.0, 1.0));
        for window in agent.trail.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            let steps = 8usize;
            for s in 0..=steps {
                let t = s as f32 / steps as f32;
                let cx = x0 + (x1 - x0) * t;
                let cy = y0 + (y1 - y0) * t;
                blend_disc(buf, w, h, cx, cy, radius * 0.5, color, 0.15);
            }
        }
        blend_disc(buf, w, h, agent.x, agent.y, radius, color, 0.95);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_disc_tints_center_pixel_toward_hue() {
        let (w, h) = (16usize, 16usize);
        let mut buf = vec![[0u8, 0, 0, 255]; w * h];
        let agents = vec![RenderAgent { x: 0.5, y: 0.5, hue: 0.0, trail: vec![] }];
        blend_trails_and_bodies(&mut buf, w, h, &agents, 0.1, 1.0);
        let center = buf[8 * w + 8];
        assert!(center[0] > 0);
    }

    #[test]
    fn empty_trail_draws_only_the_body() {
        let (w, h) = (8usize, 8usize);
        let mut buf = vec![[10u8, 10, 10, 255]; w * h];
        let agents = vec![RenderAgent { x: 0.25, y: 0.25, hue: 0.5, trail: vec![] }];
        blend_trails_and_bodies(&mut buf, w, h, &agents, 0.1, 1.0);
        assert!(buf.iter().all(|px| px[3] == 255));
    }
}
