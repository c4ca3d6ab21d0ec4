//! Migration discovery and sequencing.
//!
//! Migrations live in one directory as `<version>_<title>.<ext>` or
//! `<version>_<title>.up.<ext>`, where `ext` is `yaml`, `yml` or `json`.
//! `.down.` files are ignored; config migrations only go forward.

use crate::document::NIL_VERSION;
use crate::driver::Driver;
use crate::error::{Error, Result};
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static MIGRATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_([^.]+(?:\.[^.]+)*?)(?:\.up)?\.(yaml|yml|json)$")
        .expect("migration name pattern is valid")
});

/// One migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub path: PathBuf,
}

impl Migration {
    /// Parse a migration from its file name. `None` for files that are not
    /// forward migrations.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.contains(".down.") {
            return None;
        }

        let caps = MIGRATION_NAME.captures(file_name)?;
        let version = caps.get(1)?.as_str().parse().ok()?;
        Some(Self {
            version,
            name: caps.get(2)?.as_str().to_string(),
            path: path.to_path_buf(),
        })
    }

    fn failed(&self, source: Error) -> Error {
        Error::Migration {
            version: self.version,
            name: self.name.clone(),
            source: Box::new(source),
        }
    }
}

/// List the migrations in `dir`, sorted by version.
pub fn discover(dir: &Path) -> Result<Vec<Migration>> {
    let source_error = |reason: String| Error::MigrationSource {
        path: dir.to_path_buf(),
        reason,
    };

    let entries = std::fs::read_dir(dir).map_err(|e| Error::io("list migrations in", dir, e))?;
    let mut by_version: BTreeMap<i64, Migration> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|e| Error::io("list migrations in", dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(migration) = Migration::from_path(&path) else {
            debug!(path = %path.display(), "skipping non-migration file");
            continue;
        };

        if migration.version == 0 {
            return Err(source_error(format!(
                "{} uses version 0, which is reserved for \"no version\"",
                path.display()
            )));
        }
        if let Some(existing) = by_version.get(&migration.version) {
            return Err(source_error(format!(
                "duplicate version {} in {} and {}",
                migration.version,
                existing.path.display(),
                path.display()
            )));
        }
        by_version.insert(migration.version, migration);
    }

    Ok(by_version.into_values().collect())
}

/// Applies a sorted list of migrations to a driver.
pub struct Migrator<'a, D: Driver + ?Sized> {
    driver: &'a D,
    migrations: Vec<Migration>,
}

impl<'a, D: Driver + ?Sized> Migrator<'a, D> {
    pub fn new(driver: &'a D, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        Self { driver, migrations }
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Apply every pending migration. Returns the versions applied.
    pub fn up(&self) -> Result<Vec<i64>> {
        self.locked(|| self.apply_pending(usize::MAX))
    }

    /// Apply at most `n` pending migrations.
    pub fn steps(&self, n: usize) -> Result<Vec<i64>> {
        self.locked(|| self.apply_pending(n))
    }

    /// Record `version` as clean without running anything.
    pub fn force(&self, version: i64) -> Result<()> {
        self.locked(|| {
            self.driver.set_version(version, false)?;
            info!(version, "forced version");
            Ok(())
        })
    }

    /// Reset the target to an empty document.
    pub fn drop_data(&self) -> Result<()> {
        self.locked(|| {
            self.driver.drop_data()?;
            info!("dropped config contents");
            Ok(())
        })
    }

    pub fn version(&self) -> Result<(i64, bool)> {
        self.driver.version()
    }

    /// Run `op` under the driver lock, releasing it even when `op` fails.
    fn locked<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        self.driver.lock()?;
        let result = op();
        let unlocked = self.driver.unlock();
        let value = result?;
        unlocked?;
        Ok(value)
    }

    fn apply_pending(&self, limit: usize) -> Result<Vec<i64>> {
        let (current, dirty) = self.driver.version()?;
        if dirty {
            warn!(version = current, "config is dirty; refusing to migrate");
            return Err(Error::Dirty { version: current });
        }

        let pending = self
            .migrations
            .iter()
            .filter(|m| current == NIL_VERSION || m.version > current)
            .take(limit);

        let mut applied = Vec::new();
        for migration in pending {
            self.apply_one(migration)?;
            applied.push(migration.version);
        }

        if applied.is_empty() {
            debug!(version = current, "no pending migrations");
        }
        Ok(applied)
    }

    fn apply_one(&self, migration: &Migration) -> Result<()> {
        self.driver
            .set_version(migration.version, true)
            .map_err(|e| migration.failed(e))?;

        let mut file = File::open(&migration.path)
            .map_err(|e| migration.failed(Error::io("open migration", &migration.path, e)))?;
        self.driver
            .run(&mut file)
            .map_err(|e| migration.failed(e))?;

        self.driver
            .set_version(migration.version, false)
            .map_err(|e| migration.failed(e))?;

        info!(version = migration.version, name = %migration.name, "applied migration");
        Ok(())
    }
}
