//! A single config file as a locked, versioned migration target.

use super::Driver;
use super::lock_table::PathClaim;
use crate::codec::{Codec, is_blank};
use crate::config::Settings;
use crate::document::{NIL_VERSION, strip_version_keys, with_version_keys};
use crate::error::{Error, Result};
use crate::merge::merge;
use crate::paths::resolve_url;
use crate::placeholder::PlaceholderRegistry;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Open handle and in-process claim, held between `lock` and `unlock`.
struct Locked {
    file: File,
    _claim: PathClaim,
}

/// Config file driver.
///
/// The file is re-read and rewritten in full on every operation; nothing is
/// cached between calls.
pub struct ConfigFile<C: ?Sized = dyn Codec> {
    path: PathBuf,
    settings: Settings,
    placeholders: Arc<PlaceholderRegistry>,
    state: Mutex<Option<Locked>>,
    codec: Arc<C>,
}

impl<C: Codec + ?Sized> ConfigFile<C> {
    /// Create an unlocked handle. Resolves `url` but does not touch the file.
    pub fn new(
        codec: Arc<C>,
        url: &str,
        settings: Settings,
        placeholders: Arc<PlaceholderRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            path: resolve_url(url)?,
            settings,
            placeholders,
            state: Mutex::new(None),
            codec,
        })
    }

    /// Absolute path of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// True between a successful `lock` and the next `unlock`/`close`.
    pub fn is_locked(&self) -> bool {
        self.state().is_some()
    }

    /// Apply a migration given as bytes. See [`Driver::run`].
    pub fn apply(&self, migration: &[u8]) -> Result<()> {
        let migration = self
            .codec
            .decode(migration)
            .map_err(|source| Error::DecodeMigration {
                path: self.path.clone(),
                source,
            })?;

        self.with_file(|file| {
            let existing = self.read_document(file)?;
            let mut merged = merge(migration, existing, &self.placeholders);
            strip_version_keys(&mut merged);

            let encoded = self.encode(&merged)?;
            let encoded = self.codec.strip_quotes(self.codec.strip_nulls(encoded));
            overwrite(file, &self.path, encoded.as_bytes())?;

            debug!(path = %self.path.display(), keys = merged.len(), "applied migration");
            Ok(())
        })
    }

    fn state(&self) -> MutexGuard<'_, Option<Locked>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> Result<T>) -> Result<T> {
        let mut state = self.state();
        let locked = state.as_mut().ok_or_else(|| Error::NotLocked {
            path: self.path.clone(),
        })?;
        op(&mut locked.file)
    }

    fn open_file(&self) -> Result<File> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.settings.perm);
        }
        options.open(&self.path).map_err(|source| Error::Open {
            path: self.path.clone(),
            source,
        })
    }

    fn lock_file(&self, file: &File) -> Result<()> {
        if self.settings.wait_for_lock {
            return file
                .lock_exclusive()
                .map_err(|e| Error::io("lock", &self.path, e));
        }

        file.try_lock_exclusive().map_err(|e| {
            if is_contended(&e) {
                Error::Locked {
                    path: self.path.clone(),
                }
            } else {
                Error::io("lock", &self.path, e)
            }
        })
    }

    fn read_document(&self, file: &mut File) -> Result<crate::document::Document> {
        let bytes = read_all(file, &self.path)?;
        self.codec
            .decode(&bytes)
            .map_err(|source| Error::DecodeConfig {
                path: self.path.clone(),
                source,
            })
    }

    fn read_version(&self, file: &mut File) -> Result<(i64, bool)> {
        let bytes = read_all(file, &self.path)?;
        if is_blank(&bytes) {
            return Ok((NIL_VERSION, false));
        }

        let (version, dirty) =
            self.codec
                .extract_version(&bytes)
                .map_err(|source| Error::DecodeConfig {
                    path: self.path.clone(),
                    source,
                })?;
        if version == 0 {
            return Ok((NIL_VERSION, false));
        }
        Ok((version, dirty))
    }

    fn encode(&self, doc: &crate::document::Document) -> Result<String> {
        self.codec.encode(doc).map_err(|source| Error::Encode {
            path: self.path.clone(),
            source,
        })
    }
}

impl<C: Codec + ?Sized> Driver for ConfigFile<C> {
    fn open(&self, url: &str) -> Result<Self> {
        Self::new(
            Arc::clone(&self.codec),
            url,
            self.settings.clone(),
            Arc::clone(&self.placeholders),
        )
    }

    fn close(&self) -> Result<()> {
        let Some(locked) = self.state().take() else {
            return Ok(());
        };
        let synced = locked
            .file
            .sync_all()
            .map_err(|e| Error::io("sync", &self.path, e));
        // Dropping the handle releases the advisory lock and the claim.
        drop(locked);
        debug!(path = %self.path.display(), "unlocked config file");
        synced
    }

    fn lock(&self) -> Result<()> {
        let mut state = self.state();
        if state.is_some() {
            return Err(Error::Locked {
                path: self.path.clone(),
            });
        }

        let file = self.open_file()?;
        self.lock_file(&file)?;
        let claim = PathClaim::acquire(&self.path).ok_or_else(|| Error::Locked {
            path: self.path.clone(),
        })?;

        *state = Some(Locked {
            file,
            _claim: claim,
        });
        debug!(path = %self.path.display(), codec = self.codec.name(), "locked config file");
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        self.close()
    }

    fn run(&self, migration: &mut dyn Read) -> Result<()> {
        let mut bytes = Vec::new();
        migration
            .read_to_end(&mut bytes)
            .map_err(|e| Error::io("read migration for", &self.path, e))?;
        self.apply(&bytes)
    }

    fn set_version(&self, version: i64, dirty: bool) -> Result<()> {
        self.with_file(|file| {
            let existing = self.read_document(file)?;
            let doc = with_version_keys(existing, version, dirty);
            let encoded = self.codec.strip_nulls(self.encode(&doc)?);
            overwrite(file, &self.path, encoded.as_bytes())?;

            debug!(path = %self.path.display(), version, dirty, "set version");
            Ok(())
        })
    }

    fn version(&self) -> Result<(i64, bool)> {
        {
            let mut state = self.state();
            if let Some(locked) = state.as_mut() {
                return self.read_version(&mut locked.file);
            }
        }

        // Closed: take the lock just for this read.
        self.lock()?;
        let version = self.with_file(|file| self.read_version(file));
        let unlocked = self.unlock();
        let version = version?;
        unlocked?;
        Ok(version)
    }

    fn drop_data(&self) -> Result<()> {
        self.with_file(|file| {
            overwrite(file, &self.path, self.codec.empty_document())?;
            debug!(path = %self.path.display(), "dropped config contents");
            Ok(())
        })
    }
}

impl<C: Codec + ?Sized> std::fmt::Debug for ConfigFile<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFile")
            .field("path", &self.path)
            .field("codec", &self.codec.name())
            .field("settings", &self.settings)
            .field("locked", &self.is_locked())
            .finish()
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn read_all(file: &mut File, path: &Path) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::io("seek", path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::io("read", path, e))?;
    Ok(bytes)
}

/// Truncate, rewind and write. A failure after truncation leaves the file
/// partially written.
fn overwrite(file: &mut File, path: &Path, bytes: &[u8]) -> Result<()> {
    file.set_len(0)
        .map_err(|e| Error::io("truncate", path, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::io("seek", path, e))?;
    file.write_all(bytes)
        .map_err(|e| Error::io("write", path, e))?;
    file.flush().map_err(|e| Error::io("flush", path, e))
}
