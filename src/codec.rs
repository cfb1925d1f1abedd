//! Profile codec: a profile's `{url -> Override}` map <-> one JSON file.
//!
//! Layout: <profile_dir>/<name>.json
//! {
//!   "<url>": {"status": <int>, "response": <any>, "hang": <bool>},
//!   ...
//! }
//!
//! Path rule: ".json" is appended when the name does not already end with it;
//! an absolute name overrides the directory.
//!
//! Writes go to a per-call "<file>.<unique>.tmp" and are renamed into place, so a crash never
//! leaves a truncated profile. The Store is only touched after a load fully
//! succeeded (see `load_profile`).

use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::VeggieConfig;
use crate::error::{Result, StoreError};
use crate::metrics;
use crate::state::mutators::{index_profile, install_profile};
use crate::state::selectors::{profile_by_id_sel, profile_data_sel};
use crate::state::{Dispatched, Override, Profile, ProfileData, ProfileId, Store};

const EXT: &str = "json";

pub fn resolve_profile_path(name: &str, dir: &Path) -> PathBuf {
    let p = Path::new(name.trim());
    let path = if p.is_absolute() {
        p.to_path_buf()
    } else {
        dir.join(p)
    };
    if path.extension().is_some_and(|e| e == EXT) {
        return path;
    }
    let mut s = path.into_os_string();
    s.push(".");
    s.push(EXT);
    PathBuf::from(s)
}

/// Profile name for a file: its stem ("a/b/outage.json" -> "outage").
pub fn profile_name_of(name_or_path: &str) -> String {
    let p = Path::new(name_or_path.trim());
    let stem = if p.extension().is_some_and(|e| e == EXT) {
        p.file_stem()
    } else {
        p.file_name()
    };
    stem.map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name_or_path.trim().to_string())
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// "<file>.<pid>-<nanos>-<seq>.tmp": unique per call, concurrent saves of one
/// profile never share a temp file.
fn tmp_path_of(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut s = path.as_os_str().to_owned();
    s.push(format!(".{}-{}-{}.tmp", std::process::id(), nanos, seq));
    PathBuf::from(s)
}

fn write_atomic(path: &Path, bytes: &[u8], create_dir: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if create_dir {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let tmp = tmp_path_of(path);

    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .map_err(|e| io_err(&tmp, e))?;
    f.write_all(bytes).map_err(|e| io_err(&tmp, e))?;
    let _ = f.sync_all();
    drop(f);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Write `data` pretty-printed under `name`. Returns the file path.
pub fn save_data(name: &str, data: &ProfileData, dir: &Path, create_dir: bool) -> Result<PathBuf> {
    let path = resolve_profile_path(name, dir);
    let bytes = serde_json::to_vec_pretty(data).map_err(|e| StoreError::Decode {
        path: path.clone(),
        message: e.to_string(),
    })?;

    match write_atomic(&path, &bytes, create_dir) {
        Ok(()) => {
            metrics::record_profile_save();
            info!("profile: saved {} entr(y/ies) to {}", data.len(), path.display());
            Ok(path)
        }
        Err(e) => {
            metrics::record_profile_io_error();
            warn!("profile: save failed: {e}");
            Err(e)
        }
    }
}

/// Save a profile's cached data under its name.
pub fn save(profile: &Profile, dir: &Path) -> Result<PathBuf> {
    let data = profile.data.as_ref().ok_or_else(|| {
        StoreError::validation(format!("profile '{}' is not loaded", profile.name))
    })?;
    save_data(&profile.name, data, dir, true)
}

fn decode(path: &Path, bytes: &[u8]) -> Result<ProfileData> {
    let raw: BTreeMap<String, Override> =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    ProfileData::from_entries(raw).map_err(|e| StoreError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read and parse `<dir>/<name>.json` (or an absolute path).
pub fn load(name_or_path: &str, dir: &Path) -> Result<ProfileData> {
    let path = resolve_profile_path(name_or_path, dir);
    let res = match fs::read(&path) {
        Ok(bytes) => decode(&path, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::not_found(
                "profile file",
                path.display().to_string(),
            ));
        }
        Err(e) => Err(io_err(&path, e)),
    };
    match res {
        Ok(data) => {
            metrics::record_profile_load();
            info!("profile: loaded {} entr(y/ies) from {}", data.len(), path.display());
            Ok(data)
        }
        Err(e) => {
            metrics::record_profile_io_error();
            warn!("profile: load failed: {e}");
            Err(e)
        }
    }
}

/// Profile names (file stems) found in `dir`, sorted. A missing dir lists nothing.
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(dir, e)),
    };
    let mut names = Vec::new();
    for entry in rd {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !path.extension().is_some_and(|e| e == EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            names.push(stem.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

// ---------------- store-integrated helpers ----------------

/// Persist profile `id` to the configured directory. The current profile is
/// saved as it is live (see `profile_data_sel`).
pub fn persist_profile(store: &Store, cfg: &VeggieConfig, id: ProfileId) -> Result<PathBuf> {
    let snap = store.get_state();
    let profile =
        profile_by_id_sel(&snap, id).ok_or_else(|| StoreError::not_found("profile", id))?;
    let data = profile_data_sel(&snap, Some(id)).ok_or_else(|| {
        StoreError::validation(format!("profile '{}' is not loaded", profile.name))
    })?;
    save_data(&profile.name, &data, cfg.profile_dir(), cfg.create_profile_dir)
}

/// Load a profile file and install its data; the Store is untouched on failure.
pub fn load_profile(
    store: &Store,
    cfg: &VeggieConfig,
    name_or_path: &str,
) -> Result<Dispatched<ProfileId>> {
    let data = load(name_or_path, cfg.profile_dir())?;
    store.dispatch(install_profile(profile_name_of(name_or_path), data))
}

/// Load the data of an indexed profile if it is not loaded yet.
pub fn ensure_loaded(store: &Store, cfg: &VeggieConfig, id: ProfileId) -> Result<()> {
    let snap = store.get_state();
    let profile =
        profile_by_id_sel(&snap, id).ok_or_else(|| StoreError::not_found("profile", id))?;
    if profile.is_loaded() {
        return Ok(());
    }
    let name = profile.name.clone();
    drop(snap);
    load_profile(store, cfg, &name).map(|_| ())
}

/// Register every profile file of the configured directory (data loaded lazily).
pub fn index_profile_dir(store: &Store, cfg: &VeggieConfig) -> Result<Vec<ProfileId>> {
    let mut ids = Vec::new();
    for name in list(cfg.profile_dir())? {
        match store.dispatch(index_profile(name.clone())) {
            Ok(d) => ids.extend(d.value),
            // a stem that is not a valid profile name is skipped, not fatal
            Err(e) => warn!("profile: skip '{}' while indexing: {}", name, e),
        }
    }
    info!(
        "profile: indexed {} profile(s) from {}",
        ids.len(),
        cfg.profile_dir().display()
    );
    Ok(ids)
}
