//! Advisory per-session file locking via `fs4` — the same crate and
//! `try_lock_exclusive`-with-backoff idiom the pack's `maw-cli` uses for its
//! own workspace lock, generalized here to a narrower per-session scope
//! (spec §4.3 "Locking").

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;

use crate::error::{HansoloError, HansoloResult};

/// Polling interval between `try_lock_exclusive` attempts. Short enough that
/// a lock freed mid-wait is picked up quickly, long enough not to burn CPU.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A held advisory lock; releases on drop (`fs4` unlocks when the `File`
/// closes, and closing happens when this guard is dropped).
pub struct SessionLock {
    _file: File,
    path: PathBuf,
}

impl SessionLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks the calling thread (this runs inside `spawn_blocking` from
    /// async callers) until the lock is acquired or `timeout` elapses,
    /// polling rather than blocking indefinitely so a stuck lock surfaces
    /// as `ErrorKind::Busy` (spec §4.3) instead of hanging the caller.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> HansoloResult<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HansoloError::Internal {
                message: format!("could not create lock directory: {e}"),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| HansoloError::Internal {
                message: format!("could not open lock file {}: {e}", lock_path.display()),
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    return Ok(Self {
                        _file: file,
                        path: lock_path.to_path_buf(),
                    })
                }
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => {
                    return Err(HansoloError::Busy {
                        branch: lock_path
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    })
                }
            }
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self._file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lock");
        {
            let _lock = SessionLock::acquire(&path, Duration::from_secs(1)).unwrap();
        }
        // Should be free again immediately after drop.
        let _lock2 = SessionLock::acquire(&path, Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn times_out_when_already_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.lock");
        let _held = SessionLock::acquire(&path, Duration::from_secs(1)).unwrap();
        let result = SessionLock::acquire(&path, Duration::from_millis(120));
        assert!(matches!(result, Err(HansoloError::Busy { .. })));
    }
}
