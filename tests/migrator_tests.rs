//! Integration tests for migration discovery and the migrator.

use config_migrate::codec::{Codec, YamlCodec};
use config_migrate::config::Settings;
use config_migrate::document::{Document, NIL_VERSION};
use config_migrate::driver::{ConfigFile, Driver};
use config_migrate::error::{Error, Result};
use config_migrate::migrate::{Migration, Migrator, discover};
use config_migrate::placeholder::PlaceholderRegistry;
use serde_json::json;
use std::cell::RefCell;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A config file plus a migrations directory.
struct Fixture {
    _dir: TempDir,
    config: PathBuf,
    migrations: PathBuf,
}

impl Fixture {
    fn new(migrations: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        let dir_path = dir.path().join("migrations");
        fs::create_dir(&dir_path).unwrap();
        for (name, content) in migrations {
            fs::write(dir_path.join(name), content).unwrap();
        }
        Self {
            _dir: dir,
            config,
            migrations: dir_path,
        }
    }

    fn driver(&self) -> ConfigFile<YamlCodec> {
        ConfigFile::new(
            Arc::new(YamlCodec),
            self.config.to_str().unwrap(),
            Settings::default(),
            Arc::new(PlaceholderRegistry::new()),
        )
        .unwrap()
    }

    fn contents(&self) -> Document {
        YamlCodec.decode(&fs::read(&self.config).unwrap()).unwrap()
    }
}

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

const MIGRATIONS: &[(&str, &str)] = &[
    ("1_init.yaml", "name: app\nport: 8080\n"),
    ("2_add_db.up.yaml", "name: app\nport: 8080\ndb:\n  host: localhost\n"),
    ("2_add_db.down.yaml", "name: app\nport: 8080\n"),
    (
        "3_drop_port.yaml",
        "name: app\ndb:\n  host: localhost\n  pool: 4\n",
    ),
];

// =============================================================================
// Up
// =============================================================================

#[test]
fn test_up_applies_all_in_order() {
    let fx = Fixture::new(MIGRATIONS);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    assert_eq!(migrator.up().unwrap(), vec![1, 2, 3]);
    assert_eq!(migrator.version().unwrap(), (3, false));
    assert!(!driver.is_locked());
    assert_eq!(
        fx.contents(),
        doc(json!({
            "version": 3,
            "force": false,
            "name": "app",
            "db": {"host": "localhost", "pool": 4}
        }))
    );
}

#[test]
fn test_up_keeps_user_edits() {
    let fx = Fixture::new(MIGRATIONS);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());
    migrator.steps(2).unwrap();

    // User edits the config between releases.
    fs::write(
        &fx.config,
        "version: 2\nforce: false\nname: mine\nport: 9000\ndb:\n  host: db.internal\n",
    )
    .unwrap();

    assert_eq!(migrator.up().unwrap(), vec![3]);
    assert_eq!(
        fx.contents(),
        doc(json!({
            "version": 3,
            "force": false,
            "name": "mine",
            "db": {"host": "db.internal", "pool": 4}
        }))
    );
}

#[test]
fn test_up_with_nothing_pending() {
    let fx = Fixture::new(MIGRATIONS);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    migrator.up().unwrap();
    let before = fs::read_to_string(&fx.config).unwrap();
    assert!(migrator.up().unwrap().is_empty());
    assert_eq!(fs::read_to_string(&fx.config).unwrap(), before);
}

#[test]
fn test_steps_limits_applied_migrations() {
    let fx = Fixture::new(MIGRATIONS);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    assert_eq!(migrator.steps(1).unwrap(), vec![1]);
    assert_eq!(migrator.version().unwrap(), (1, false));
    assert_eq!(migrator.steps(5).unwrap(), vec![2, 3]);
    assert!(migrator.steps(1).unwrap().is_empty());
}

#[test]
fn test_steps_zero_applies_nothing() {
    let fx = Fixture::new(MIGRATIONS);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    assert!(migrator.steps(0).unwrap().is_empty());
    assert_eq!(migrator.version().unwrap(), (NIL_VERSION, false));
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_failed_migration_leaves_dirty_version() {
    let fx = Fixture::new(&[
        ("1_init.yaml", "a: 1\n"),
        ("2_broken.yaml", "a: [1\n"),
        ("3_more.yaml", "a: 1\nb: 2\n"),
    ]);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    let err = migrator.up().unwrap_err();
    match &err {
        Error::Migration { version, name, .. } => {
            assert_eq!(*version, 2);
            assert_eq!(name, "broken");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!driver.is_locked());
    assert_eq!(migrator.version().unwrap(), (2, true));

    // Dirty files are left for the operator.
    assert!(matches!(migrator.up(), Err(Error::Dirty { version: 2 })));

    // Fix by hand, force, continue.
    migrator.force(2).unwrap();
    assert_eq!(migrator.up().unwrap(), vec![3]);
    assert_eq!(migrator.version().unwrap(), (3, false));
}

#[test]
fn test_up_fails_when_locked_elsewhere() {
    let fx = Fixture::new(MIGRATIONS);
    let holder = fx.driver();
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    holder.lock().unwrap();
    assert!(migrator.up().unwrap_err().is_locked());
    holder.unlock().unwrap();
    assert_eq!(migrator.up().unwrap(), vec![1, 2, 3]);
}

// =============================================================================
// Force and drop
// =============================================================================

#[test]
fn test_force_and_drop() {
    let fx = Fixture::new(MIGRATIONS);
    let driver = fx.driver();
    let migrator = Migrator::new(&driver, discover(&fx.migrations).unwrap());

    migrator.force(2).unwrap();
    assert_eq!(migrator.version().unwrap(), (2, false));
    assert_eq!(migrator.up().unwrap(), vec![3]);

    migrator.drop_data().unwrap();
    assert_eq!(migrator.version().unwrap(), (NIL_VERSION, false));
    assert!(fx.contents().is_empty());
}

// =============================================================================
// Protocol
// =============================================================================

/// Records every driver call.
#[derive(Default)]
struct RecordingDriver {
    calls: RefCell<Vec<String>>,
    version: RefCell<(i64, bool)>,
}

impl RecordingDriver {
    fn at(version: i64, dirty: bool) -> Self {
        Self {
            calls: RefCell::default(),
            version: RefCell::new((version, dirty)),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl Driver for RecordingDriver {
    fn open(&self, _url: &str) -> Result<Self> {
        Ok(Self::default())
    }

    fn close(&self) -> Result<()> {
        self.record("close");
        Ok(())
    }

    fn lock(&self) -> Result<()> {
        self.record("lock");
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        self.record("unlock");
        Ok(())
    }

    fn run(&self, migration: &mut dyn Read) -> Result<()> {
        let mut body = String::new();
        migration.read_to_string(&mut body).unwrap();
        self.record(format!("run {}", body.trim()));
        Ok(())
    }

    fn set_version(&self, version: i64, dirty: bool) -> Result<()> {
        self.record(format!("set_version {version} {dirty}"));
        *self.version.borrow_mut() = (version, dirty);
        Ok(())
    }

    fn version(&self) -> Result<(i64, bool)> {
        self.record("version");
        Ok(*self.version.borrow())
    }

    fn drop_data(&self) -> Result<()> {
        self.record("drop");
        Ok(())
    }
}

fn migrations_in(dir: &Path, files: &[(&str, &str)]) -> Vec<Migration> {
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    discover(dir).unwrap()
}

#[test]
fn test_protocol_call_sequence() {
    let dir = TempDir::new().unwrap();
    let migrations = migrations_in(dir.path(), &[("1_a.yaml", "a: 1"), ("2_b.yaml", "b: 2")]);
    let driver = RecordingDriver::at(NIL_VERSION, false);

    Migrator::new(&driver, migrations).up().unwrap();

    assert_eq!(
        *driver.calls.borrow(),
        vec![
            "lock",
            "version",
            "set_version 1 true",
            "run a: 1",
            "set_version 1 false",
            "set_version 2 true",
            "run b: 2",
            "set_version 2 false",
            "unlock",
        ]
    );
}

#[test]
fn test_dirty_driver_is_unlocked_after_refusal() {
    let dir = TempDir::new().unwrap();
    let migrations = migrations_in(dir.path(), &[("1_a.yaml", "a: 1")]);
    let driver = RecordingDriver::at(1, true);

    let err = Migrator::new(&driver, migrations).up().unwrap_err();
    assert!(matches!(err, Error::Dirty { version: 1 }));
    assert_eq!(*driver.calls.borrow(), vec!["lock", "version", "unlock"]);
}

#[test]
fn test_only_newer_migrations_run() {
    let dir = TempDir::new().unwrap();
    let migrations = migrations_in(
        dir.path(),
        &[("1_a.yaml", "a: 1"), ("5_b.yaml", "b: 2"), ("9_c.yaml", "c: 3")],
    );
    let driver = RecordingDriver::at(5, false);

    let applied = Migrator::new(&driver, migrations).up().unwrap();
    assert_eq!(applied, vec![9]);
}
