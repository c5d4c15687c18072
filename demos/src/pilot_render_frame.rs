//! CPU Fallback Render Pilot
//!
//! Steps a small SubQG + mycel state forward a few ticks, scatters a
//! handful of agents on top, renders one RGBA8 frame through the CPU
//! fallback path, and writes the raw pixels alongside a `.txt` sidecar
//! describing the buffer shape (no PNG encoder in the dependency stack,
//! so downstream tooling is left to interpret the raw bytes).
//!
//! Run in release mode:
//! ```bash
//! cargo run --release -p mycelia-demos --bin pilot-render-frame
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mycelia_render::{render_frame, RenderAgent, RenderParams};
use mycelia_sim::mycel::MycelState;
use mycelia_sim::subqg::SubQGState;

const GRID_W: usize = 64;
const GRID_H: usize = 64;

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut subqg = SubQGState::new(GRID_W, GRID_H, 0.08, 0.5, false, 11).context("subqg init")?;
    let mycel = MycelState::init(GRID_W * GRID_H, 3, 6, GRID_W * GRID_H, &mut rng).context("mycel init")?;

    for _ in 0..20 {
        subqg.step(None, true)?;
    }

    let pheromone_rgb: Vec<f32> = (0..GRID_W * GRID_H)
        .flat_map(|cell| {
            (0..3).map(move |ch| {
                let k = mycel.k;
                let c = mycel.c;
                if ch >= c {
                    0.0
                } else {
                    (0..k).map(|kk| mycel.pheromone[cell * k * c + kk * c + ch]).sum::<f32>() / k.max(1) as f32
                }
            })
        })
        .collect();

    let agents = vec![
        RenderAgent { x: 0.3, y: 0.4, hue: 0.1, trail: vec![(0.2, 0.3), (0.25, 0.35), (0.3, 0.4)] },
        RenderAgent { x: 0.7, y: 0.6, hue: 0.6, trail: vec![] },
    ];

    let params = RenderParams { w: GRID_W, h: GRID_H, exposure: 1.1, agent_radius: 0.03, tile_h: Some(8), clip_percentile: 0.98 };
    let frame = render_frame(&subqg.field_map, &pheromone_rgb, &agents, &params)?;

    let out_dir = Path::new("target").join("mycelia-demos");
    fs::create_dir_all(&out_dir)?;
    let raw_path = out_dir.join("frame.rgba8");
    let bytes: Vec<u8> = frame.iter().flatten().copied().collect();
    fs::write(&raw_path, &bytes)?;
    fs::write(out_dir.join("frame.txt"), format!("{GRID_W}x{GRID_H} RGBA8, {} bytes\n", bytes.len()))?;

    println!("wrote {} bytes to {}", bytes.len(), raw_path.display());
    Ok(())
}
