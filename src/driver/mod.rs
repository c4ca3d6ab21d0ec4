//! Migration target contract and the config file implementation.
//!
//! An orchestrator drives a target through a fixed protocol:
//!
//! ```text
//! lock -> version -> (set_version(v, true) -> run -> set_version(v, false))* -> unlock
//! ```
//!
//! `set_version(v, true)` before each `run` marks the file dirty, so a run that
//! dies halfway leaves a visible record of which version broke it.

mod file;
mod lock_table;

pub use file::ConfigFile;

use crate::error::Result;
use std::io::Read;

/// Operations a migration orchestrator needs from a target.
pub trait Driver {
    /// A fresh, unlocked handle for `url` with this handle's settings.
    fn open(&self, url: &str) -> Result<Self>
    where
        Self: Sized;

    /// Release the lock if held. No-op otherwise.
    fn close(&self) -> Result<()>;

    /// Take exclusive ownership of the target.
    fn lock(&self) -> Result<()>;

    /// Give up ownership. Safe to call when not locked.
    fn unlock(&self) -> Result<()>;

    /// Apply one migration.
    fn run(&self, migration: &mut dyn Read) -> Result<()>;

    /// Record the current version and whether it is dirty.
    fn set_version(&self, version: i64, dirty: bool) -> Result<()>;

    /// Current version and dirty flag; [`NIL_VERSION`](crate::document::NIL_VERSION)
    /// when nothing was applied.
    fn version(&self) -> Result<(i64, bool)>;

    /// Reset the target to an empty document.
    fn drop_data(&self) -> Result<()>;
}
