//! SubQG + mycel + agent + brain entry points — spec §4.4 through §4.8,
//! §4.11, and §7's function-name groups.
//!
//! `_batched` suffixes mirror the source driver's naming: every kernel
//! already iterates the full `W*H` cell grid (or `T_cap` node set) in one
//! launch, so the "batched" name historically just marked the per-cell
//! kernel rather than a second resident instance. Both names are exposed
//! and dispatch to the same host implementation.

use std::ffi::c_char;
use std::fs::File;
use std::io::BufWriter;

use rand::rngs::StdRng;
use rand::SeedableRng;

use mycelia_core::MycelError;
use mycelia_sim::{AgentPopulation, BrainState, MycelState, SubQGState};

use crate::driver::with_slot;
use crate::error_state::guard;
use crate::lifecycle::cstr_to_string;

#[no_mangle]
pub extern "C" fn subqg_initialize_state(
    gpu_index: u32,
    w: u32,
    h: u32,
    noise_level: f32,
    threshold: f32,
    deterministic: i32,
    seed: u64,
) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            slot.subqg = Some(SubQGState::new(w as usize, h as usize, noise_level, threshold, deterministic != 0, seed)?);
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn subqg_initialize_state_batched(
    gpu_index: u32,
    w: u32,
    h: u32,
    noise_level: f32,
    threshold: f32,
    deterministic: i32,
    seed: u64,
) -> i32 {
    subqg_initialize_state(gpu_index, w, h, noise_level, threshold, deterministic, seed)
}

fn run_subqg_step(gpu_index: u32, write_field_map: i32) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let subqg = slot.subqg.as_mut().ok_or_else(|| MycelError::Validation("subqg not initialized".into()))?;
            subqg.step(None, write_field_map != 0)
        })
    })
}

#[no_mangle]
pub extern "C" fn subqg_simulation_step(gpu_index: u32, write_field_map: i32) -> i32 {
    run_subqg_step(gpu_index, write_field_map)
}

#[no_mangle]
pub extern "C" fn subqg_simulation_step_batched(gpu_index: u32, write_field_map: i32) -> i32 {
    run_subqg_step(gpu_index, write_field_map)
}

/// Seeds the agent population's positions from the SubQG grid: scatters
/// `count` agents uniformly across `[0,1)^2` using the slot's existing RNG
/// seed, the way `init_mycel` seeds policy weights.
#[no_mangle]
pub extern "C" fn subqg_inject_agents(gpu_index: u32, count: u32, seed: u64) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            slot.subqg.as_ref().ok_or_else(|| MycelError::Validation("subqg not initialized".into()))?;
            let mut agents = AgentPopulation::new(count as usize, mycelia_sim::agent::AGENT_STRIDE)?;
            let mut rng = StdRng::seed_from_u64(seed);
            agents.seed_policy_gaussian(0.1, &mut rng);
            use rand::Rng;
            // Scatter initial positions directly on the output buffer.
            let stride = mycelia_sim::agent::AGENT_STRIDE;
            let buf = agents.out_buf_mut();
            for a in 0..count as usize {
                let base = a * stride;
                buf[base + mycelia_sim::agent::field::POS_X] = rng.gen_range(0.0..1.0);
                buf[base + mycelia_sim::agent::field::POS_Y] = rng.gen_range(0.0..1.0);
            }
            agents.swap();
            slot.agents = Some(agents);
            slot.brain = Some(BrainState::new(count as usize));
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn subqg_init_mycel(gpu_index: u32, t_cap: u32, c: u32, k: u32, t_act: u32, seed: u64) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mycel = MycelState::init(t_cap as usize, c as usize, k as usize, t_act as usize, &mut rng)?;
            if let Some(agents) = slot.agents.as_mut() {
                agents.seed_policy_gaussian(0.1, &mut rng);
            }
            slot.mycel = Some(mycel);
            slot.proto_dim = c as usize;
            slot.prototypes = vec![0.0f32; t_cap as usize * slot.proto_dim];
            Ok(())
        })
    })
}

/// # Safety
/// `neigh_idx` must point to `len` valid `i32`s.
#[no_mangle]
pub unsafe extern "C" fn set_neighbors_sparse(gpu_index: u32, neigh_idx: *const i32, len: u64) -> i32 {
    guard(1, 0, move || {
        if neigh_idx.is_null() {
            return Err(MycelError::Validation("neigh_idx is null".into()));
        }
        let slice = std::slice::from_raw_parts(neigh_idx, len as usize).to_vec();
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.set_neighbors_sparse(slice)
        })
    })
}

#[no_mangle]
pub extern "C" fn set_diffusion_params(gpu_index: u32, decay_default: f32, diffu_default: f32) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.set_diffusion_params(decay_default, diffu_default);
            Ok(())
        })
    })
}

/// # Safety
/// `gains` must point to `len` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn set_pheromone_gains(gpu_index: u32, gains: *const f32, len: u64) -> i32 {
    guard(1, 0, move || {
        if gains.is_null() {
            return Err(MycelError::Validation("gains is null".into()));
        }
        let slice = std::slice::from_raw_parts(gains, len as usize).to_vec();
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.set_pheromone_gains(slice)
        })
    })
}

/// # Safety
/// `activity` must point to `len` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn step_pheromone_reinforce(gpu_index: u32, activity: *const f32, len: u64) -> i32 {
    guard(1, 0, move || {
        if activity.is_null() {
            return Err(MycelError::Validation("activity is null".into()));
        }
        let slice = std::slice::from_raw_parts(activity, len as usize);
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.reinforce(slice)
        })
    })
}

#[no_mangle]
pub extern "C" fn step_pheromone_diffuse_decay(gpu_index: u32) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.diffuse_decay();
            Ok(())
        })
    })
}

/// `step_mycel_update`: per-tick nutrient update (spec §4.5 `nutrient(activity)`).
///
/// # Safety
/// `activity` must point to `len` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn step_mycel_update(gpu_index: u32, activity: *const f32, len: u64) -> i32 {
    guard(1, 0, move || {
        if activity.is_null() {
            return Err(MycelError::Validation("activity is null".into()));
        }
        let slice = std::slice::from_raw_parts(activity, len as usize);
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.nutrient_step(slice)
        })
    })
}

#[no_mangle]
pub extern "C" fn step_colony_update(gpu_index: u32, iterations: u32) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.colony_update(iterations as usize);
            Ok(())
        })
    })
}

/// Returns the number of new nodes spawned (>= 0), or -1 on error.
///
/// # Safety
/// `activity` must point to `len` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn step_reproduction(gpu_index: u32, activity: *const f32, len: u64) -> i64 {
    if activity.is_null() {
        crate::error_state::set_error("activity is null");
        return -1;
    }
    let slice = std::slice::from_raw_parts(activity, len as usize).to_vec();
    let mut spawned: i64 = -1;
    let result = with_slot(gpu_index, |slot| {
        let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
        let mut rng = StdRng::seed_from_u64(0xA5A5_5A5A);
        let n = mycel.reproduction(&slice, &mut slot.prototypes, slot.proto_dim.max(1), &mut rng)?;
        spawned = n as i64;
        Ok(())
    });
    match result {
        Ok(()) => spawned,
        Err(e) => {
            crate::error_state::set_error_from_mycel(&e);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn step_subqg_feedback(gpu_index: u32) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.subqg_feedback();
            Ok(())
        })
    })
}

/// # Safety
/// `weights` must point to `len` valid `f32`s.
#[no_mangle]
pub unsafe extern "C" fn step_potential_for_hpio(gpu_index: u32, weights: *const f32, len: u64) -> i32 {
    guard(1, 0, move || {
        if weights.is_null() {
            return Err(MycelError::Validation("weights is null".into()));
        }
        let slice = std::slice::from_raw_parts(weights, len as usize);
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            mycel.potential_for_hpio(slice)
        })
    })
}

/// # Safety
/// `out` must point to `t_count * C` writable `f32`s, or be null (unused).
#[no_mangle]
pub unsafe extern "C" fn read_pheromone_slice(gpu_index: u32, t_start: u32, t_count: u32, out: *mut f32) -> i32 {
    guard(1, 0, move || {
        if out.is_null() {
            return Err(MycelError::Validation("out is null".into()));
        }
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_ref().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            let (t_start, t_count, c) = (t_start as usize, t_count as usize, mycel.c);
            if t_start + t_count > mycel.t_cap {
                return Err(MycelError::Validation("pheromone slice out of range".into()));
            }
            let start = t_start * mycel.k * c;
            let len = t_count * mycel.k * c;
            let slice = &mycel.pheromone[start..start + len];
            std::ptr::copy_nonoverlapping(slice.as_ptr(), out, slice.len());
            Ok(())
        })
    })
}

/// Size-probe contract: when `out` is null or `bytes == 0`, returns the
/// required byte length without copying.
///
/// # Safety
/// `out`, when non-null, must point to at least `bytes` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn read_full_pheromone_buffer(gpu_index: u32, out: *mut u8, bytes: u64) -> i64 {
    let result = with_slot(gpu_index, |slot| {
        let mycel = slot.mycel.as_ref().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
        let required = (mycel.pheromone.len() * std::mem::size_of::<f32>()) as u64;
        if out.is_null() || bytes == 0 {
            return Ok(required as i64);
        }
        if bytes < required {
            return Err(MycelError::Validation(format!(
                "buffer of {bytes} bytes too small for {required} bytes of pheromone data"
            )));
        }
        let src = mycel.pheromone.as_ptr() as *const u8;
        std::ptr::copy_nonoverlapping(src, out, required as usize);
        Ok(required as i64)
    });
    match result {
        Ok(n) => n,
        Err(e) => {
            crate::error_state::set_error_from_mycel(&e);
            -1
        }
    }
}

fn run_mycel_agent_cycle(gpu_index: u32, cycles: u32, sensory_gain: f32, learning_rate: f32, dt: f32) -> i32 {
    guard(1, 0, move || {
        with_slot(gpu_index, |slot| {
            let subqg = slot.subqg.as_mut().ok_or_else(|| MycelError::Validation("subqg not initialized".into()))?;
            let brain = slot.brain.as_mut().ok_or_else(|| MycelError::Validation("brain not initialized".into()))?;
            let agents = slot.agents.as_mut().ok_or_else(|| MycelError::Validation("agents not initialized".into()))?;
            let mycel = slot.mycel.as_mut().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            for _ in 0..cycles {
                let adam_t = (slot.cycle.cycle_count + 1) as u32;
                slot.cycle.run_cycle(
                    subqg,
                    brain,
                    agents,
                    mycel,
                    sensory_gain,
                    learning_rate,
                    adam_t,
                    learning_rate,
                    sensory_gain,
                    dt,
                    || false,
                )?;
            }
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn mycel_agent_cycle(gpu_index: u32, cycles: u32, sensory_gain: f32, learning_rate: f32, dt: f32) -> i32 {
    run_mycel_agent_cycle(gpu_index, cycles, sensory_gain, learning_rate, dt)
}

#[no_mangle]
pub extern "C" fn cycle_vram_organism(gpu_index: u32, cycles: u32, gain: f32, lr: f32) -> i32 {
    run_mycel_agent_cycle(gpu_index, cycles, gain, lr, 0.1)
}

/// # Safety
/// `path` must be a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn save_mycel_state(gpu_index: u32, path: *const c_char) -> i32 {
    guard(1, 0, move || {
        let path = cstr_to_string(path).ok_or_else(|| MycelError::Validation("path is null or not valid UTF-8".into()))?;
        with_slot(gpu_index, |slot| {
            let mycel = slot.mycel.as_ref().ok_or_else(|| MycelError::Validation("mycel not initialized".into()))?;
            let file = File::create(&path).map_err(|e| MycelError::Persistence(e.to_string()))?;
            let mut writer = BufWriter::new(file);
            mycelia_sim::persist::save(mycel, &mut writer)
        })
    })
}

/// # Safety
/// `path` must be a valid nul-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn load_mycel_state(gpu_index: u32, path: *const c_char) -> i32 {
    guard(1, 0, move || {
        let path = cstr_to_string(path).ok_or_else(|| MycelError::Validation("path is null or not valid UTF-8".into()))?;
        let mut file = std::fs::File::open(&path).map_err(|e| MycelError::Persistence(e.to_string()))?;
        let mycel = mycelia_sim::persist::load(&mut file)?;
        with_slot(gpu_index, |slot| {
            slot.mycel = Some(mycel);
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::initialize_gpu;

    fn setup(idx: u32) {
        assert_eq!(initialize_gpu(idx), 1);
        assert_eq!(subqg_initialize_state(idx, 4, 4, 0.01, 0.5, 1, 7), 1);
        assert_eq!(subqg_inject_agents(idx, 4, 11), 1);
        assert_eq!(subqg_init_mycel(idx, 4, 2, 2, 4, 3), 1);
        let neigh = [1i32, 2, 2, 3, 3, 0, 0, 1];
        let ok = unsafe { set_neighbors_sparse(idx, neigh.as_ptr(), neigh.len() as u64) };
        assert_eq!(ok, 1);
    }

    #[test]
    fn full_abi_tick_sequence_runs_end_to_end() {
        let idx = 1u32;
        setup(idx);
        assert_eq!(step_pheromone_diffuse_decay(idx), 1);
        assert_eq!(step_subqg_feedback(idx), 1);
        assert_eq!(step_colony_update(idx, 2), 1);
        assert_eq!(mycel_agent_cycle(idx, 2, 1.0, 0.01, 1.0), 1);
    }

    #[test]
    fn pheromone_size_probe_matches_actual_read() {
        let idx = 2u32;
        setup(idx);
        let required = unsafe { read_full_pheromone_buffer(idx, std::ptr::null_mut(), 0) };
        assert!(required > 0);
        let mut buf = vec![0u8; required as usize];
        let written = unsafe { read_full_pheromone_buffer(idx, buf.as_mut_ptr(), buf.len() as u64) };
        assert_eq!(written, required);
    }

    #[test]
    fn save_and_load_round_trip_via_tempfile() {
        let idx = 3u32;
        setup(idx);
        let path = std::env::temp_dir().join("mycelia_abi_test_state.bin");
        let path_c = std::ffi::CString::new(path.to_str().unwrap()).unwrap();
        assert_eq!(unsafe { save_mycel_state(idx, path_c.as_ptr()) }, 1);
        assert_eq!(unsafe { load_mycel_state(idx, path_c.as_ptr()) }, 1);
        let _ = std::fs::remove_file(&path);
    }
}
