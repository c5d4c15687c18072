//! Per-cell shading formula, kept in lockstep with
//! `mycelia-gpu/src/kernels/render.cl`'s `shade_cell` (spec §4.10).

pub type Rgba8 = [u8; 4];

pub fn shade_cell(height: f32, r: f32, g: f32, b: f32, exposure: f32) -> Rgba8 {
    let diffuse = (height * 0.6 + 0.4).clamp(0.0, 1.0);
    let specular = height.clamp(0.0, 1.0).powf(8.0) * 0.3;
    let foam = if height > 0.85 { (height - 0.85) * 6.0 } else { 0.0 };
    let base_r = 0.1 + 0.3 * diffuse;
    let base_g = 0.2 + 0.4 * diffuse;
    let base_b = 0.5 + 0.5 * diffuse;
    let out_r = ((base_r + specular + foam + r * 0.5) * exposure).clamp(0.0, 1.0);
    let out_g = ((base_g + specular + foam + g * 0.5) * exposure).clamp(0.0, 1.0);
    let out_b = ((base_b + specular + foam + b * 0.5) * exposure).clamp(0.0, 1.0);
    [
        (out_r * 255.0) as u8,
        (out_g * 255.0) as u8,
        (out_b * 255.0) as u8,
        255,
    ]
}

pub fn debug_gradient_cell(x: usize, y: usize, w: usize, h: usize) -> Rgba8 {
    let r = ((x * 255) / (w.saturating_sub(1)).max(1)) as u8;
    let g = ((y * 255) / (h.saturating_sub(1)).max(1)) as u8;
    [r, g, 128, 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shade_cell_always_returns_opaque_pixels() {
        for h in [-0.2, 0.0, 0.5, 0.9, 1.0] {
            let px = shade_cell(h, 0.1, 0.2, 0.3, 1.0);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn debug_gradient_spans_full_range_at_corners() {
        let (w, h) = (128usize, 128usize);
        assert_eq!(debug_gradient_cell(0, 0, w, h), [0, 0, 128, 255]);
        let corner = debug_gradient_cell(w - 1, h - 1, w, h);
        assert_eq!(corner[0], 255);
        assert_eq!(corner[1], 255);
    }
}
