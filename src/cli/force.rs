//! Force subcommand: record a version after a failed migration was fixed by
//! hand.

use super::TargetArgs;
use clap::Args;

/// Arguments for the force subcommand
#[derive(Args, Debug)]
pub struct ForceArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Version to record (-1 clears it)
    #[arg(allow_negative_numbers = true)]
    pub version: i64,
}
