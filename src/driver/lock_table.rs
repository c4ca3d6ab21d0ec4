//! Process-wide table of locked config paths.
//!
//! Advisory file locks are not guaranteed to exclude two handles inside the
//! same process on every platform, so each locked path is also claimed here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

static HELD: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// A claimed path; released on drop.
#[derive(Debug)]
pub(crate) struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    /// Claim `path`, or `None` if another handle in this process holds it.
    pub(crate) fn acquire(path: &Path) -> Option<Self> {
        let mut held = HELD.lock().unwrap_or_else(PoisonError::into_inner);
        held.insert(path.to_path_buf()).then(|| Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        HELD.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}
