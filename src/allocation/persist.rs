//! Locked read-modify-write of the allocations file.
//!
//! Every mutation follows the same cycle: take the exclusive lock, load the
//! file (or start empty), run the caller's closure, write back atomically only
//! if the closure succeeded, release the lock. A failed closure leaves the file
//! exactly as it was.

use super::info::normalize_name;
use super::locker::{platform_locker, Locker};
use super::Store;
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ALLOCATIONS_FILE_NAME: &str = "allocations.yaml";
pub const LOCK_FILE_NAME: &str = "allocations.lock";

/// Location of the allocations file and its lock inside a config directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub data: PathBuf,
    pub lock: PathBuf,
}

impl StorePaths {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            data: config_dir.join(ALLOCATIONS_FILE_NAME),
            lock: config_dir.join(LOCK_FILE_NAME),
        }
    }
}

/// Releases the lock on every exit path, unwinding included.
struct Held<'a> {
    locker: &'a mut dyn Locker,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.locker.release() {
            warn!("{}", e);
        }
    }
}

/// Run `mutate` against the store in `config_dir` under the exclusive lock.
///
/// The store is saved only when `mutate` returns `Ok`.
pub fn with_store<T>(
    config_dir: &Path,
    mutate: impl FnOnce(&mut Store) -> Result<T>,
) -> Result<T> {
    let paths = ensure_dir(config_dir)?;
    let mut locker = platform_locker(&paths.lock);
    with_store_using(locker.as_mut(), &paths.data, mutate)
}

/// [`with_store`] with an explicit locker and data file.
pub fn with_store_using<T>(
    locker: &mut dyn Locker,
    data_path: &Path,
    mutate: impl FnOnce(&mut Store) -> Result<T>,
) -> Result<T> {
    locker.acquire()?;
    let _held = Held { locker };

    let mut store = load(data_path)?;
    let value = mutate(&mut store)?;
    save(data_path, &store)?;

    Ok(value)
}

/// Load the store under the lock without writing anything back.
pub fn read_store(config_dir: &Path) -> Result<Store> {
    let paths = ensure_dir(config_dir)?;
    let mut locker = platform_locker(&paths.lock);
    locker.acquire()?;
    let _held = Held {
        locker: locker.as_mut(),
    };
    load(&paths.data)
}

fn ensure_dir(config_dir: &Path) -> Result<StorePaths> {
    fs::create_dir_all(config_dir).map_err(|e| {
        Error::Filesystem(format!(
            "Failed to create config directory '{}': {}",
            config_dir.display(),
            e
        ))
    })?;
    Ok(StorePaths::new(config_dir))
}

/// Read the allocations file. A missing or blank file is an empty store.
pub fn load(path: &Path) -> Result<Store> {
    // Directly try to read the file - avoid TOCTOU race
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No allocations file at {:?}, starting empty", path);
            return Ok(Store::new());
        }
        Err(e) => {
            return Err(Error::Filesystem(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };
    decode(&contents, path)
}

/// Parse file contents and enforce the port-key invariant.
pub fn decode(contents: &str, path: &Path) -> Result<Store> {
    if contents.trim().is_empty() {
        return Ok(Store::new());
    }

    let corrupted = |reason: String| Error::CorruptedStore {
        path: path.to_path_buf(),
        reason,
    };

    let mut store: Store =
        serde_yaml::from_str(contents).map_err(|e| corrupted(e.to_string()))?;

    for (key, info) in store.allocations.iter_mut() {
        if *key == 0 {
            return Err(corrupted("allocation keyed by port 0".to_string()));
        }
        if info.directory.trim().is_empty() {
            return Err(corrupted(format!("allocation {} has no directory", key)));
        }
        if info.port != 0 && info.port != *key {
            warn!(
                "Allocation keyed {} claims port {}; using the key",
                key, info.port
            );
        }
        info.port = *key;
        info.name = normalize_name(&info.name).to_string();
    }

    Ok(store)
}

pub fn encode(store: &Store) -> Result<String> {
    Ok(serde_yaml::to_string(store)?)
}

/// Serialize and atomically replace the allocations file.
pub fn save(path: &Path, store: &Store) -> Result<()> {
    atomic_write(path, &encode(store)?)
}

/// Atomic file write using write-then-rename pattern
/// This prevents file corruption if the process crashes during write
fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let temp_path = path.with_extension("yaml.tmp");
    let mut file = fs::File::create(&temp_path)
        .map_err(|e| Error::Filesystem(format!("Failed to create temp file: {}", e)))?;

    file.write_all(contents.as_bytes())
        .map_err(|e| Error::Filesystem(format!("Failed to write temp file: {}", e)))?;

    // Ensure data is written to disk before rename
    file.sync_all()
        .map_err(|e| Error::Filesystem(format!("Failed to sync temp file: {}", e)))?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Filesystem(format!(
            "Failed to rename temp file: {}",
            e
        )));
    }

    Ok(())
}
