//! Error types for config migrations.
//!
//! Every filesystem and codec failure is surfaced with the path it concerns
//! and the operation that failed. Nothing here is retried internally.

use crate::codec::CodecError;
use crate::placeholder::PlaceholderError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the driver, the merger's collaborators and the migrator.
#[derive(Debug, Error)]
pub enum Error {
    /// The migration document could not be decoded.
    #[error("failed to parse migration for {}: {source}", path.display())]
    DecodeMigration {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The current contents of the config file could not be decoded.
    #[error("failed to parse {}: {source}", path.display())]
    DecodeConfig {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The merged document could not be encoded.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Another handle or process holds the lock on the file.
    #[error("{} is locked", path.display())]
    Locked { path: PathBuf },

    /// The file could not be opened or created.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An operation that needs the lock was called on a closed handle.
    #[error("{} is not locked", path.display())]
    NotLocked { path: PathBuf },

    /// Seek, read, truncate, write or lock failure on the locked file.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The driver target could not be parsed into a path.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    /// The file records a failed migration that needs operator attention.
    #[error("config is dirty at version {version}; fix it and force a version")]
    Dirty { version: i64 },

    /// The migrations directory could not be listed or contains bad entries.
    #[error("migration source {}: {reason}", path.display())]
    MigrationSource { path: PathBuf, reason: String },

    /// A single migration step failed.
    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True when the failure was lock contention rather than a broken file.
    pub fn is_locked(&self) -> bool {
        matches!(self, Error::Locked { .. })
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, Error>;
