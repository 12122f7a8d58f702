/// Per-owner bridge lock
///
/// The delete-then-recreate volume cycle is not safe under concurrent
/// invocation, so `start` and `stop` hold an exclusive flock on
/// `<owner-dir>/.lock` for their whole duration. The kernel drops the lock
/// when the holder exits.
use crate::config::types::{BridgeError, Result};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub struct OwnerLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl OwnerLock {
    /// Acquire without blocking; a held lock yields [`BridgeError::LockBusy`].
    pub fn acquire(owner_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(owner_dir)?;
        let path = owner_dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                debug!("Acquired {}", path.display());
                Ok(Self { _lock: lock, path })
            }
            Err((_, Errno::EWOULDBLOCK)) => Err(BridgeError::LockBusy { path }),
            Err((_, errno)) => Err(BridgeError::Io(std::io::Error::from(errno))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OwnerLock {
    fn drop(&mut self) {
        debug!("Released {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let owner_dir = dir.path().join("xpra").join("browser");

        let first = OwnerLock::acquire(&owner_dir).unwrap();
        assert!(first.path().exists());
        assert!(matches!(
            OwnerLock::acquire(&owner_dir),
            Err(BridgeError::LockBusy { .. })
        ));

        drop(first);
        assert!(OwnerLock::acquire(&owner_dir).is_ok());
    }

    #[test]
    fn test_locks_are_per_owner() {
        let dir = tempfile::tempdir().unwrap();
        let _browser = OwnerLock::acquire(&dir.path().join("browser")).unwrap();
        assert!(OwnerLock::acquire(&dir.path().join("mail")).is_ok());
    }
}
