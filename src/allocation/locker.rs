use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Process-wide mutual exclusion around the allocations file.
///
/// `acquire` blocks until the lock is held; `release` is idempotent.
pub trait Locker {
    fn acquire(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// Advisory lock on a dedicated lock file.
///
/// The data file is replaced by rename on every save, so the lock lives on a
/// separate file whose inode never changes. The holder's PID is written into
/// it for diagnostics only.
#[cfg(any(unix, windows))]
pub struct FileLocker {
    path: PathBuf,
    file: Option<std::fs::File>,
}

#[cfg(any(unix, windows))]
impl FileLocker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(any(unix, windows))]
impl Locker for FileLocker {
    fn acquire(&mut self) -> Result<()> {
        use fs2::FileExt;
        use std::io::Write;

        if self.file.is_some() {
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                Error::LockAcquisition(format!("Cannot open '{}': {}", self.path.display(), e))
            })?;

        // Exclusive lock; blocks until any concurrent invocation finishes
        file.lock_exclusive().map_err(|e| {
            Error::LockAcquisition(format!("Cannot lock '{}': {}", self.path.display(), e))
        })?;

        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        debug!("Acquired advisory lock on {:?}", self.path);

        self.file = Some(file);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        use fs2::FileExt;

        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let result = file.unlock().map_err(|e| {
            Error::LockAcquisition(format!("Cannot unlock '{}': {}", self.path.display(), e))
        });
        // Closing the handle drops the lock even if unlock reported an error
        drop(file);
        debug!("Released advisory lock on {:?}", self.path);
        result
    }
}

#[cfg(any(unix, windows))]
impl Drop for FileLocker {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Locker for platforms without advisory locking: no exclusion at all.
#[derive(Debug, Default)]
pub struct NoopLocker;

impl Locker for NoopLocker {
    fn acquire(&mut self) -> Result<()> {
        warn!("Advisory file locking is unavailable on this platform; concurrent runs may race");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The locker this platform supports for `lock_path`.
pub fn platform_locker(lock_path: &Path) -> Box<dyn Locker> {
    #[cfg(any(unix, windows))]
    {
        Box::new(FileLocker::new(lock_path))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = lock_path;
        Box::new(NoopLocker)
    }
}

#[cfg(all(test, any(unix, windows)))]
mod tests {
    use super::*;
    use fs2::FileExt;

    #[test]
    fn acquire_blocks_other_handles_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("allocations.lock");

        let mut locker = FileLocker::new(&lock_path);
        locker.acquire().unwrap();

        let probe = std::fs::OpenOptions::new()
            .write(true)
            .open(&lock_path)
            .unwrap();
        assert!(probe.try_lock_exclusive().is_err());

        locker.release().unwrap();
        assert!(probe.try_lock_exclusive().is_ok());
        probe.unlock().unwrap();
    }

    #[test]
    fn acquire_and_release_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut locker = FileLocker::new(dir.path().join("allocations.lock"));

        locker.acquire().unwrap();
        locker.acquire().unwrap();
        locker.release().unwrap();
        locker.release().unwrap();
    }

    #[test]
    fn lock_file_records_holder_pid() {
        let dir = tempfile::tempdir().unwrap();
        let mut locker = FileLocker::new(dir.path().join("allocations.lock"));
        locker.acquire().unwrap();

        let contents = std::fs::read_to_string(locker.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("allocations.lock");
        {
            let mut locker = FileLocker::new(&lock_path);
            locker.acquire().unwrap();
        }
        let probe = std::fs::OpenOptions::new()
            .write(true)
            .open(&lock_path)
            .unwrap();
        assert!(probe.try_lock_exclusive().is_ok());
    }

    #[test]
    fn noop_locker_never_fails() {
        let mut locker = NoopLocker;
        locker.acquire().unwrap();
        locker.release().unwrap();
    }
}
