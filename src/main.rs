//! config-migrate
//!
//! Applies versioned migrations to a YAML or JSON config file, keeping the
//! values users have already set.

use anyhow::{Context, Result};
use clap::Parser;
use config_migrate::cli::force::ForceArgs;
use config_migrate::cli::up::UpArgs;
use config_migrate::cli::{Cli, Command, TargetArgs};
use config_migrate::config::Settings;
use config_migrate::document::NIL_VERSION;
use config_migrate::driver::ConfigFile;
use config_migrate::logging::{self, LogTarget};
use config_migrate::migrate::{Migrator, discover};
use config_migrate::paths::resolve_target;
use config_migrate::placeholder::PlaceholderRegistry;
use std::sync::Arc;
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let settings = Settings::load_or_default(cli.settings.as_deref())?;
    let placeholders = Arc::new(
        PlaceholderRegistry::with_builtins().context("failed to register placeholders")?,
    );
    debug!(?settings, names = ?placeholders.names(), "starting");

    match cli.command {
        Command::Up(args) => run_up(&settings, placeholders, args),
        Command::Version(target) => run_version(&settings, placeholders, target),
        Command::Force(args) => run_force(&settings, placeholders, args),
        Command::Drop(target) => run_drop(&settings, placeholders, target),
    }
}

/// Build the driver for a target, picking the format from `--format`, the URL
/// scheme or the file extension.
fn open_target(
    target: &TargetArgs,
    settings: &Settings,
    placeholders: Arc<PlaceholderRegistry>,
) -> Result<ConfigFile> {
    let resolved = resolve_target(&target.config)?;
    let format = target.format_for(&resolved);
    debug!(path = %resolved.path.display(), %format, "opening config");

    Ok(ConfigFile::new(
        format.codec(),
        &target.config,
        settings.clone(),
        placeholders,
    )?)
}

fn run_up(settings: &Settings, placeholders: Arc<PlaceholderRegistry>, args: UpArgs) -> Result<()> {
    let driver = open_target(&args.target, settings, placeholders)?;
    let migrations = discover(&args.migrations).with_context(|| {
        format!("failed to read migrations from {}", args.migrations.display())
    })?;
    let migrator = Migrator::new(&driver, migrations);

    let applied = match args.steps {
        Some(n) => migrator.steps(n),
        None => migrator.up(),
    }
    .with_context(|| format!("failed to migrate {}", driver.path().display()))?;

    if applied.is_empty() {
        println!("no change");
    } else {
        for version in &applied {
            println!("applied {version}");
        }
    }
    Ok(())
}

fn run_version(
    settings: &Settings,
    placeholders: Arc<PlaceholderRegistry>,
    target: TargetArgs,
) -> Result<()> {
    let driver = open_target(&target, settings, placeholders)?;
    let (version, dirty) = Migrator::new(&driver, Vec::new())
        .version()
        .with_context(|| format!("failed to read version of {}", driver.path().display()))?;

    match (version, dirty) {
        (NIL_VERSION, _) => println!("no version"),
        (version, true) => println!("{version} (dirty)"),
        (version, false) => println!("{version}"),
    }
    Ok(())
}

fn run_force(
    settings: &Settings,
    placeholders: Arc<PlaceholderRegistry>,
    args: ForceArgs,
) -> Result<()> {
    let driver = open_target(&args.target, settings, placeholders)?;
    Migrator::new(&driver, Vec::new())
        .force(args.version)
        .with_context(|| format!("failed to force version of {}", driver.path().display()))?;
    println!("forced {}", args.version);
    Ok(())
}

fn run_drop(
    settings: &Settings,
    placeholders: Arc<PlaceholderRegistry>,
    target: TargetArgs,
) -> Result<()> {
    let driver = open_target(&target, settings, placeholders)?;
    Migrator::new(&driver, Vec::new())
        .drop_data()
        .with_context(|| format!("failed to drop {}", driver.path().display()))?;
    println!("dropped {}", driver.path().display());
    Ok(())
}
