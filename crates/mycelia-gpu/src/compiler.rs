//! Kernel compiler & on-disk binary cache — spec §4.1.
//!
//! Every kernel is compiled in two variants, strict and fast-math, with
//! build options derived from device capabilities. Compiled binaries are
//! cached under `<cache_dir>/<device_tag>_<kernel>_<hash>.bin` with a fixed
//! header so a rebuild with identical inputs reuses the binary.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use mycelia_core::config::{KERNEL_CACHE_MAGIC, KERNEL_CACHE_VERSION};
use mycelia_core::hash::{cache_key, fnv1a64};
use mycelia_core::{MycelError, MycelResult};
use ocl::{Context, Device, Kernel, Program};

/// One compiled kernel, strict or fast-math.
#[derive(Clone)]
pub struct KernelVariant {
    pub program: Program,
    pub name: String,
    pub is_fast_math: bool,
}

impl KernelVariant {
    pub fn build(&self, queue: ocl::Queue) -> MycelResult<Kernel> {
        Kernel::builder()
            .program(&self.program)
            .name(&self.name)
            .queue(queue)
            .build()
            .map_err(|e| MycelError::Launch {
                label: self.name.clone(),
                status: ocl_status(&e),
            })
    }
}

/// Both variants of one kernel, keyed by logical kernel name.
#[derive(Default)]
pub struct ProgramCache {
    variants: HashMap<String, (Option<KernelVariant>, Option<KernelVariant>)>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self {
            variants: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str, fast_math: bool) -> Option<&KernelVariant> {
        self.variants.get(name).and_then(|(strict, fast)| {
            if fast_math {
                fast.as_ref()
            } else {
                strict.as_ref()
            }
        })
    }

    pub fn insert(&mut self, name: &str, fast_math: bool, variant: KernelVariant) {
        let entry = self.variants.entry(name.to_string()).or_default();
        if fast_math {
            entry.1 = Some(variant);
        } else {
            entry.0 = Some(variant);
        }
    }
}

/// Build-option string for one (device capability, fast-math) combination,
/// per spec §4.1.
pub fn build_options(
    cl_2_0: bool,
    has_fp64: bool,
    has_atomics32: bool,
    has_atomics64: bool,
    fast_math: bool,
) -> String {
    let mut opts = String::new();
    opts.push_str(if cl_2_0 {
        "-cl-std=CL2.0 "
    } else {
        "-cl-std=CL1.2 "
    });
    opts.push_str("-Werror ");
    opts.push_str("-DFP_TYPE=float -DFP_TYPE_SIZE=4 ");
    if has_fp64 {
        opts.push_str("-DCL_HAS_FP64 ");
    }
    if has_atomics32 {
        opts.push_str("-DCL_HAS_ATOMICS ");
    }
    if has_atomics64 {
        opts.push_str("-DCL_HAS_INT64_ATOMICS ");
    }
    if fast_math {
        opts.push_str(
            "-DENABLE_FAST_VARIANT=1 -cl-fast-relaxed-math -cl-mad-enable \
             -cl-no-signed-zeros -cl-unsafe-math-optimizations -DFAST_MATH ",
        );
    } else {
        opts.push_str("-DENABLE_FAST_VARIANT=0 ");
    }
    opts.trim_end().to_string()
}

struct CacheHeader {
    binary_size: u64,
    build_hash: u64,
}

fn cache_path(cache_dir: &str, device_tag: &str, kernel: &str, key: u64) -> PathBuf {
    Path::new(cache_dir).join(format!("{device_tag}_{kernel}_{key:016x}.bin"))
}

fn read_cache(path: &Path, expected_build_hash: u64) -> Option<Vec<u8>> {
    let mut file = fs::File::open(path).ok()?;
    let mut header = [0u8; 4 + 4 + 8 + 8];
    file.read_exact(&mut header).ok()?;
    let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let version = u32::from_le_bytes(header[4..8].try_into().unwrap());
    let binary_size = u64::from_le_bytes(header[8..16].try_into().unwrap());
    let build_hash = u64::from_le_bytes(header[16..24].try_into().unwrap());
    if magic != KERNEL_CACHE_MAGIC || version != KERNEL_CACHE_VERSION || build_hash != expected_build_hash {
        return None;
    }
    let mut binary = vec![0u8; binary_size as usize];
    file.read_exact(&mut binary).ok()?;
    Some(binary)
}

fn write_cache(path: &Path, binary: &[u8], build_hash: u64) -> MycelResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| MycelError::Allocation(format!("cache dir create failed: {e}")))?;
    }
    let header = CacheHeader {
        binary_size: binary.len() as u64,
        build_hash,
    };
    let mut file = fs::File::create(path)
        .map_err(|e| MycelError::Allocation(format!("cache file create failed: {e}")))?;
    file.write_all(&KERNEL_CACHE_MAGIC.to_le_bytes()).ok();
    file.write_all(&KERNEL_CACHE_VERSION.to_le_bytes()).ok();
    file.write_all(&header.binary_size.to_le_bytes()).ok();
    file.write_all(&header.build_hash.to_le_bytes()).ok();
    file.write_all(binary)
        .map_err(|e| MycelError::Allocation(format!("cache file write failed: {e}")))?;
    Ok(())
}

/// Compile (or load from cache) one kernel variant.
///
/// `source_hash`/`build_hash` use FNV-1a 64; the cache key XORs them
/// (optionally with a fast-math magic) per spec §4.1.
pub fn compile_kernel(
    context: &Context,
    device: Device,
    cache_dir: &str,
    device_tag: &str,
    kernel_name: &str,
    source: &str,
    opts: &str,
    fast_math: bool,
) -> MycelResult<KernelVariant> {
    let source_hash = fnv1a64(source.as_bytes());
    let build_hash = fnv1a64(opts.as_bytes());
    let key = cache_key(source_hash, build_hash, fast_math);
    let path = cache_path(cache_dir, device_tag, kernel_name, key);

    let program = if let Some(binary) = read_cache(&path, build_hash) {
        log::debug!("kernel cache hit: {}", path.display());
        Program::builder()
            .devices(device)
            .binaries(&[binary])
            .build(context)
            .map_err(|e| MycelError::Allocation(format!("program-from-binary failed: {e}")))?
    } else {
        log::debug!("kernel cache miss, compiling {kernel_name} (fast_math={fast_math})");
        let program = Program::builder()
            .src(source)
            .devices(device)
            .cmplr_opt(opts)
            .build(context)
            .map_err(|e| MycelError::Allocation(format!("kernel build failed: {e}")))?;
        if let Ok(binaries) = program.binaries() {
            if let Some(Some(binary)) = binaries.into_iter().next() {
                if let Err(e) = write_cache(&path, &binary, build_hash) {
                    log::warn!("failed to persist kernel cache for {kernel_name}: {e}");
                }
            }
        }
        program
    };

    Ok(KernelVariant {
        program,
        name: kernel_name.to_string(),
        is_fast_math: fast_math,
    })
}

pub(crate) fn ocl_status(err: &ocl::Error) -> i32 {
    err.api_status().map(|s| s as i32).unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_include_fast_math_flags_only_when_requested() {
        let strict = build_options(true, true, true, true, false);
        let fast = build_options(true, true, true, true, true);
        assert!(!strict.contains("FAST_MATH"));
        assert!(fast.contains("-cl-fast-relaxed-math"));
        assert!(fast.contains("-DENABLE_FAST_VARIANT=1"));
        assert!(strict.contains("-DENABLE_FAST_VARIANT=0"));
    }

    #[test]
    fn cache_path_is_stable_for_identical_inputs() {
        let p1 = cache_path("build/kernel_cache", "dev0", "subqg_step", 42);
        let p2 = cache_path("build/kernel_cache", "dev0", "subqg_step", 42);
        assert_eq!(p1, p2);
    }
}
