//! Up subcommand: apply pending migrations from a directory.

use super::TargetArgs;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the up subcommand
#[derive(Args, Debug)]
pub struct UpArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory containing `<version>_<title>.<ext>` migration files
    #[arg(short, long, value_name = "DIR")]
    pub migrations: PathBuf,

    /// Apply at most this many migrations
    #[arg(long, value_name = "N")]
    pub steps: Option<usize>,
}
