//! core::lock
//!
//! Exclusive fleet lock for modfleet runs.
//!
//! Only one modfleet process may orchestrate a given fleet root at a time;
//! two runs interleaving stash/unstash on the same working trees would lose
//! changes.
//!
//! # Storage
//!
//! - `<cache dir>/modfleet/<escaped fleet root>.lock` - Lock file with
//!   OS-level exclusive lock. Kept outside the fleet so it never shows up as
//!   an untracked file in a working tree.
//!
//! # Invariants
//!
//! - Lock is held from before shelving until after restoration
//! - Lock is automatically released on drop
//! - Acquisition is non-blocking (fails fast if locked)

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Lock file path for the fleet rooted at `root`.
pub fn lock_path_for(root: &Path) -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let escaped: String = root
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    base.join("modfleet").join(format!("{}.lock", escaped.trim_matches('_')))
}

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("fleet at {0} is locked by another modfleet process")]
    AlreadyLocked(PathBuf),

    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a fleet root.
///
/// Released when dropped, even if the run panics.
#[derive(Debug)]
pub struct FleetLock {
    path: PathBuf,
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl FleetLock {
    /// Attempt to acquire the lock for the fleet rooted at `root`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(root: &Path) -> Result<Self, LockError> {
        Self::acquire_at(&lock_path_for(root), root)
    }

    /// Acquire an explicit lock file on behalf of `root`.
    pub fn acquire_at(path: &Path, root: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let path = path.to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked(root.to_path_buf()))
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for FleetLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
