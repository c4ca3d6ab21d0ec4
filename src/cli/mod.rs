//! CLI command definitions for config-migrate.
//!
//! The main entry point is the `Cli` struct; each subcommand with more than a
//! target path has its own argument struct.

pub mod force;
pub mod up;

use crate::codec::Format;
use crate::paths::Target;
use clap::{Args, Parser, Subcommand};
use force::ForceArgs;
use std::path::PathBuf;
use up::UpArgs;

/// Versioned migrations for YAML and JSON config files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Path to a driver settings file (YAML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending migrations
    Up(UpArgs),

    /// Print the current version of a config file
    Version(TargetArgs),

    /// Set the version without running migrations and clear the dirty flag
    Force(ForceArgs),

    /// Reset a config file to an empty document
    Drop(TargetArgs),
}

/// The config file a command operates on.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Config file path or URL (e.g. `yaml://./config.yaml`)
    #[arg(short, long, value_name = "PATH")]
    pub config: String,

    /// File format (default: from the URL scheme, then the file extension, else yaml)
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

impl TargetArgs {
    /// `--format` if given, then the URL scheme, then the file extension,
    /// then YAML.
    pub fn format_for(&self, target: &Target) -> Format {
        self.format
            .or_else(|| target.scheme.as_deref().and_then(Format::from_scheme))
            .or_else(|| Format::from_path(&target.path))
            .unwrap_or_default()
    }
}
