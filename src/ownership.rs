//! Ownership and permission normalization for created paths
//!
//! Downloads and repository refreshes may run under elevated privileges; every
//! path the manager creates is handed back to the invoking user afterwards.
//! All operations are idempotent and never fail the caller: problems are
//! logged and skipped.

use nix::unistd::{Gid, Uid, chown, getgid, getuid};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use walkdir::WalkDir;

/// Default mode for created directories
pub const DIR_MODE: u32 = 0o755;
/// Default mode for created files
pub const FILE_MODE: u32 = 0o644;

/// Normalizes ownership and permissions after a write
pub trait OwnershipEnforcer: Send + Sync {
    /// Recursively set ownership of a path and everything below it
    fn apply(&self, path: &Path);

    /// Set ownership and file mode of a single file
    fn apply_file(&self, path: &Path);

    /// Create a directory if needed, then set ownership and directory mode
    fn apply_dir(&self, path: &Path);
}

/// Production enforcer that chowns to a fixed user/group
pub struct UnixOwnership {
    uid: Uid,
    gid: Gid,
}

impl UnixOwnership {
    /// Enforcer for the user running the process
    pub fn current() -> Self {
        Self {
            uid: getuid(),
            gid: getgid(),
        }
    }

    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: Uid::from_raw(uid),
            gid: Gid::from_raw(gid),
        }
    }

    fn chown_one(&self, path: &Path) {
        if let Err(e) = chown(path, Some(self.uid), Some(self.gid)) {
            tracing::warn!(path = ?path, error = %e, "Could not fix ownership");
        }
    }

    fn set_mode(&self, path: &Path, mode: u32) {
        match std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
            Ok(()) => tracing::debug!(path = ?path, mode = format!("{:o}", mode), "Set permissions"),
            Err(e) => tracing::warn!(path = ?path, error = %e, "Could not set permissions"),
        }
    }
}

impl Default for UnixOwnership {
    fn default() -> Self {
        Self::current()
    }
}

impl OwnershipEnforcer for UnixOwnership {
    fn apply(&self, path: &Path) {
        if !path.exists() {
            tracing::debug!(path = ?path, "Skipping ownership fix for missing path");
            return;
        }

        tracing::debug!(path = ?path, uid = %self.uid, gid = %self.gid, "Fixing ownership");
        for entry in WalkDir::new(path) {
            match entry {
                Ok(entry) => self.chown_one(entry.path()),
                Err(e) => tracing::warn!(error = %e, "Could not walk path for ownership fix"),
            }
        }
    }

    fn apply_file(&self, path: &Path) {
        if !path.is_file() {
            return;
        }
        self.chown_one(path);
        self.set_mode(path, FILE_MODE);
    }

    fn apply_dir(&self, path: &Path) {
        if !path.exists()
            && let Err(e) = std::fs::create_dir_all(path)
        {
            tracing::warn!(path = ?path, error = %e, "Could not create directory");
            return;
        }
        self.apply(path);
        self.set_mode(path, DIR_MODE);
    }
}
