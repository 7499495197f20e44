//! Advisory base lock
//!
//! A single writer holds an exclusive `flock` on the base's lock file while
//! it persists patches or rebuilds the base. Readers never lock. The guard
//! releases the lock when dropped, so every exit path unlocks.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{LockConfig, LockMode};
use crate::error::{Result, StorageError};
use crate::paths::SafeDir;

/// Held lock; unlocks on drop. A bypassed lock holds nothing.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_bypassed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = sys::unlock(&file) {
                warn!(path = %self.path.display(), error = %e, "Failed to release base lock");
            } else {
                debug!(path = %self.path.display(), "Released base lock");
            }
        }
    }
}

/// Take the base lock according to `config`.
pub fn acquire(dir: &SafeDir, config: &LockConfig) -> Result<LockGuard> {
    if config.is_bypassed() {
        debug!("Locking bypassed by configuration");
        return Ok(LockGuard {
            file: None,
            path: PathBuf::new(),
        });
    }

    let path = dir.resolve(&config.file_name)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| {
            StorageError::lock(format!("Cannot open lock file {}", path.display())).with_source(e)
        })?;

    let taken = sys::lock(&file, config.mode == LockMode::Wait).map_err(|e| {
        StorageError::lock(format!("Cannot lock {}", path.display())).with_source(e)
    })?;
    if !taken {
        warn!(path = %path.display(), "Base is locked by another process");
        return Err(StorageError::lock(format!(
            "Base is locked: {}",
            path.display()
        )));
    }

    debug!(path = %path.display(), mode = ?config.mode, "Acquired base lock");
    Ok(LockGuard {
        file: Some(file),
        path,
    })
}

/// Run `action` under the base lock, or `on_failure` if the lock cannot be
/// taken.
pub fn control<T>(
    dir: &SafeDir,
    config: &LockConfig,
    on_failure: impl FnOnce(StorageError) -> T,
    action: impl FnOnce() -> T,
) -> T {
    match acquire(dir, config) {
        Ok(_guard) => action(),
        Err(e) => on_failure(e),
    }
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    /// Returns `Ok(false)` when a non-blocking attempt finds the lock held.
    pub(super) fn lock(file: &File, wait: bool) -> io::Result<bool> {
        let op = if wait {
            libc::LOCK_EX
        } else {
            libc::LOCK_EX | libc::LOCK_NB
        };
        loop {
            // SAFETY: the descriptor is owned by `file` and open for the call.
            let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
            if rc == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EWOULDBLOCK) if !wait => return Ok(false),
                _ => return Err(err),
            }
        }
    }

    pub(super) fn unlock(file: &File) -> io::Result<()> {
        // SAFETY: as above.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    // No advisory locking primitive; the lock file still marks the writer.
    pub(super) fn lock(_file: &File, _wait: bool) -> io::Result<bool> {
        Ok(true)
    }

    pub(super) fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}
