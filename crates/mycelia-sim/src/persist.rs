//! Binary save/load of mycel state — spec §4.11.
//!
//! Layout: magic, version, then `{T_cap, C, K, T_act, free_head}`, then the
//! state arrays in the exact order spec §4.11 lists them, then the scalar
//! parameter groups. Load re-validates magic/version and reinitializes to
//! the recorded dimensions before reading state back in.

use std::io::{self, Read, Write};

use mycelia_core::config::{MYCEL_PERSIST_MAGIC, MYCEL_PERSIST_VERSION};
use mycelia_core::{MycelError, MycelResult};

use crate::mycel::{MycelState, ReproParams};

fn io_err(e: io::Error) -> MycelError {
    MycelError::Persistence(e.to_string())
}

fn write_u32(w: &mut impl Write, v: u32) -> MycelResult<()> {
    w.write_all(&v.to_le_bytes()).map_err(io_err)
}

fn write_u64(w: &mut impl Write, v: u64) -> MycelResult<()> {
    w.write_all(&v.to_le_bytes()).map_err(io_err)
}

fn write_f32_slice(w: &mut impl Write, s: &[f32]) -> MycelResult<()> {
    for &v in s {
        w.write_all(&v.to_le_bytes()).map_err(io_err)?;
    }
    Ok(())
}

fn write_i32_slice(w: &mut impl Write, s: &[i32]) -> MycelResult<()> {
    for &v in s {
        w.write_all(&v.to_le_bytes()).map_err(io_err)?;
    }
    Ok(())
}

fn write_bool_slice(w: &mut impl Write, s: &[bool]) -> MycelResult<()> {
    let bytes: Vec<u8> = s.iter().map(|&b| b as u8).collect();
    w.write_all(&bytes).map_err(io_err)
}

fn write_u8_slice(w: &mut impl Write, s: &[u8]) -> MycelResult<()> {
    w.write_all(s).map_err(io_err)
}

fn read_u32(r: &mut impl Read) -> MycelResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> MycelResult<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32_vec(r: &mut impl Read, n: usize) -> MycelResult<Vec<f32>> {
    let mut out = Vec::with_capacity(n);
    let mut buf = [0u8; 4];
    for _ in 0..n {
        r.read_exact(&mut buf).map_err(io_err)?;
        out.push(f32::from_le_bytes(buf));
    }
    Ok(out)
}

fn read_i32_vec(r: &mut impl Read, n: usize) -> MycelResult<Vec<i32>> {
    let mut out = Vec::with_capacity(n);
    let mut buf = [0u8; 4];
    for _ in 0..n {
        r.read_exact(&mut buf).map_err(io_err)?;
        out.push(i32::from_le_bytes(buf));
    }
    Ok(out)
}

fn read_bool_vec(r: &mut impl Read, n: usize) -> MycelResult<Vec<bool>> {
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf.into_iter().map(|b| b != 0).collect())
}

fn read_u8_vec(r: &mut impl Read, n: usize) -> MycelResult<Vec<u8>> {
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf)
}

/// Serialize full mycel state to `w`, per spec §4.11's exact field order.
pub fn save(state: &MycelState, w: &mut impl Write) -> MycelResult<()> {
    write_u32(w, MYCEL_PERSIST_MAGIC)?;
    write_u32(w, MYCEL_PERSIST_VERSION)?;
    write_u64(w, state.t_cap as u64)?;
    write_u64(w, state.c as u64)?;
    write_u64(w, state.k as u64)?;
    write_u64(w, state.t_act as u64)?;
    write_u64(w, state.free_count() as u64)?;

    write_bool_slice(w, &state.alive)?;
    write_u8_slice(w, &state.colony_id)?;
    write_i32_slice(w, &state.free_list_view())?;
    write_f32_slice(w, &state.nutrient)?;
    write_f32_slice(w, &state.mood)?;
    write_f32_slice(w, &state.reinforce_gain)?;
    write_f32_slice(w, &state.kappa_mood)?;
    write_i32_slice(w, &state.neigh_idx)?;
    write_f32_slice(w, &state.decay)?;
    write_f32_slice(w, &state.diffu)?;
    write_f32_slice(w, &state.pheromone)?;
    write_f32_slice(w, &state.potential)?;
    write_f32_slice(w, &state.subqg_field)?;

    write_f32_slice(w, &[state.repro.threshold_nutrient, state.repro.threshold_activity, state.repro.mutation_sigma])?;
    write_f32_slice(w, &[state.decay_default, state.diffu_default])?;
    write_f32_slice(w, &[state.nutrient_recovery, state.kappa_nutrient])?;

    Ok(())
}

/// Load mycel state from `r`, verifying magic/version and reinitializing
/// to the recorded `T_cap/C/K` before filling arrays in the saved order.
pub fn load(r: &mut impl Read) -> MycelResult<MycelState> {
    let magic = read_u32(r)?;
    if magic != MYCEL_PERSIST_MAGIC {
        return Err(MycelError::Persistence(format!(
            "bad magic: expected {MYCEL_PERSIST_MAGIC:#x}, got {magic:#x}"
        )));
    }
    let version = read_u32(r)?;
    if version != MYCEL_PERSIST_VERSION {
        return Err(MycelError::Persistence(format!(
            "unsupported persistence version {version}"
        )));
    }

    let t_cap = read_u64(r)? as usize;
    let c = read_u64(r)? as usize;
    let k = read_u64(r)? as usize;
    let t_act = read_u64(r)? as usize;
    let free_head = read_u64(r)? as usize;

    let alive = read_bool_vec(r, t_cap)?;
    let colony_id = read_u8_vec(r, t_cap)?;
    let free_list = read_i32_vec(r, t_cap)?;
    let nutrient = read_f32_vec(r, t_cap)?;
    let mood = read_f32_vec(r, t_cap * c)?;
    let reinforce_gain = read_f32_vec(r, c)?;
    let kappa_mood = read_f32_vec(r, c)?;
    let neigh_idx = read_i32_vec(r, t_cap * k)?;
    let decay = read_f32_vec(r, t_cap * k)?;
    let diffu = read_f32_vec(r, t_cap * k)?;
    let pheromone = read_f32_vec(r, t_cap * k * c)?;
    let potential = read_f32_vec(r, t_cap)?;
    let subqg_field = read_f32_vec(r, t_cap)?;

    let repro_scalars = read_f32_vec(r, 3)?;
    let decay_diffu_default = read_f32_vec(r, 2)?;
    let recovery_kappa = read_f32_vec(r, 2)?;

    let repro = ReproParams {
        threshold_nutrient: repro_scalars[0],
        threshold_activity: repro_scalars[1],
        mutation_sigma: repro_scalars[2],
    };

    MycelState::from_parts(
        t_cap,
        c,
        k,
        t_act,
        free_head,
        alive,
        colony_id,
        free_list.into_iter().map(|v| v as usize).collect(),
        nutrient,
        mood,
        reinforce_gain,
        kappa_mood,
        neigh_idx,
        decay,
        diffu,
        pheromone,
        potential,
        subqg_field,
        repro,
        decay_diffu_default[0],
        decay_diffu_default[1],
        recovery_kappa[0],
        recovery_kappa[1],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    #[test]
    fn round_trips_full_state() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = MycelState::init(4, 2, 2, 3, &mut rng).unwrap();
        state.set_neighbors_sparse(vec![1, -1, 2, -1, 3, -1, 0, -1]).unwrap();
        state.nutrient[0] = 0.42;
        state.colony_id[1] = 7;

        let mut buf = Vec::new();
        save(&state, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let loaded = load(&mut cursor).unwrap();

        assert_eq!(loaded.t_cap, state.t_cap);
        assert_eq!(loaded.c, state.c);
        assert_eq!(loaded.k, state.k);
        assert_eq!(loaded.t_act, state.t_act);
        assert_eq!(loaded.free_count(), state.free_count());
        assert_eq!(loaded.nutrient, state.nutrient);
        assert_eq!(loaded.colony_id, state.colony_id);
        assert_eq!(loaded.neigh_idx, state.neigh_idx);
        assert!(loaded.check_alive_free_bijection());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&MYCEL_PERSIST_VERSION.to_le_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(load(&mut cursor).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MYCEL_PERSIST_MAGIC.to_le_bytes());
        buf.extend_from_slice(&99u32.to_le_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(load(&mut cursor).is_err());
    }
}
