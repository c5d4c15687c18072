//! Driver-wide tunables.
//!
//! `spec.md` leaves most of these as constants embedded in kernel source or
//! as function defaults; we surface them as a `serde`-derived config layered
//! from an optional `mycelia.toml` plus a handful of documented env vars, the
//! way the teacher workspace layers `toml` config over `std::env`.

use serde::{Deserialize, Serialize};

pub const NOISE_FACTOR_MIN: f32 = 0.1;
pub const NOISE_FACTOR_MAX: f32 = 2.0;
pub const NOISE_THRESH_HIGH: f32 = 1.5;
pub const NOISE_THRESH_LOW: f32 = 0.5;

pub const MAX_DEVICE_SLOTS: usize = 8;

pub const KERNEL_CACHE_MAGIC: u32 = 0x4D59434C;
pub const KERNEL_CACHE_VERSION: u32 = 1;
pub const MYCEL_PERSIST_MAGIC: u32 = 0x4D59434C;
pub const MYCEL_PERSIST_VERSION: u32 = 1;

pub const DEFAULT_HEBBIAN_CHUNK_ROWS: usize = 256;
pub const DEFAULT_HEBBIAN_MAX_BYTES: u64 = 64 * 1024 * 1024;
pub const CYCLE_FINISH_INTERVAL: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Directory holding compiled-kernel-binary cache files.
    pub kernel_cache_dir: String,
    /// Force `clFinish` after every profiled launch instead of only at
    /// cycle boundaries.
    pub force_kernel_finish: bool,
    /// Global throttle applied after every profiled enqueue, in
    /// milliseconds. `0` disables throttling.
    pub throttle_ms: u64,
    /// Byte cap for the social-Hebbian tiled update.
    pub hebbian_max_bytes: u64,
    /// Rows per Hebbian chunk.
    pub hebbian_chunk_rows: usize,
    /// Run `clFinish` every N autonomous cycles instead of `clFlush`.
    pub cycle_finish_interval: u32,
    /// Force the CPU render fallback even when OpenCL is available.
    pub safe_render: bool,
    /// Tile height override for the CPU/GPU tiled renderer.
    pub render_tile_h: Option<u32>,
    /// Emit the debug gradient frame once at startup.
    pub debug_render: bool,
    /// Prefer the `uchar4` buffer-writing render kernel over `image2d_t`.
    pub render_prefer_buffer: bool,
    /// Disable the quantum subsystem entirely.
    pub disable_quantum: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kernel_cache_dir: "build/kernel_cache".to_string(),
            force_kernel_finish: true,
            throttle_ms: 0,
            hebbian_max_bytes: DEFAULT_HEBBIAN_MAX_BYTES,
            hebbian_chunk_rows: DEFAULT_HEBBIAN_CHUNK_ROWS,
            cycle_finish_interval: CYCLE_FINISH_INTERVAL,
            safe_render: false,
            render_tile_h: None,
            debug_render: true,
            render_prefer_buffer: false,
            disable_quantum: false,
        }
    }
}

impl DriverConfig {
    /// Load `path` as TOML if it exists, then apply the documented env-var
    /// overrides (`CC_DISABLE_QUANTUM`, `MYCEL_DEBUG_RENDER`,
    /// `MYCEL_SAFE_RENDER`, `MYCEL_TILE_H`, `MYCEL_RENDER_BUFFER`).
    pub fn from_env_and_file(path: Option<&str>) -> Self {
        let mut cfg = path
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default();
        cfg.apply_env();
        cfg
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CC_DISABLE_QUANTUM") {
            self.disable_quantum = env_truthy(&v);
        }
        if let Ok(v) = std::env::var("MYCEL_DEBUG_RENDER") {
            self.debug_render = env_truthy(&v);
        }
        if let Ok(v) = std::env::var("MYCEL_SAFE_RENDER") {
            self.safe_render = env_truthy(&v);
        }
        if let Ok(v) = std::env::var("MYCEL_TILE_H") {
            if let Ok(n) = v.parse::<u32>() {
                self.render_tile_h = Some(n);
            }
        }
        if let Ok(v) = std::env::var("MYCEL_RENDER_BUFFER") {
            self.render_prefer_buffer = env_truthy(&v);
        }
    }
}

/// Env-var truthiness used throughout the ABI: anything other than empty,
/// `"0"`, or a case-insensitive `"false"` is considered set.
pub fn env_truthy(v: &str) -> bool {
    !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec_semantics() {
        assert!(!env_truthy(""));
        assert!(!env_truthy("0"));
        assert!(!env_truthy("false"));
        assert!(!env_truthy("FALSE"));
        assert!(env_truthy("1"));
        assert!(env_truthy("yes"));
    }

    #[test]
    fn default_config_matches_spec_constants() {
        let cfg = DriverConfig::default();
        assert_eq!(cfg.hebbian_max_bytes, 64 * 1024 * 1024);
        assert_eq!(cfg.cycle_finish_interval, 5);
    }
}
