//! Driver settings.
//!
//! Settings come from defaults, an optional YAML file and then environment
//! variables:
//! - `CONFIG_MIGRATE_PERM` - octal permission bits for newly created files
//! - `CONFIG_MIGRATE_WAIT_FOR_LOCK` - `1`/`true` to block on a held lock

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default permission bits for a config file created by `lock`.
pub const DEFAULT_PERM: u32 = 0o666;

/// Settings for a config file driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Permission bits used when the config file has to be created.
    #[serde(default = "default_perm")]
    pub perm: u32,

    /// Block until a contended lock is released instead of failing.
    #[serde(default)]
    pub wait_for_lock: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            perm: default_perm(),
            wait_for_lock: false,
        }
    }
}

fn default_perm() -> u32 {
    DEFAULT_PERM
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        Ok(settings)
    }

    /// Load from `path` when given, otherwise start from defaults; then apply
    /// environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(perm) = lookup("CONFIG_MIGRATE_PERM") {
            self.perm = parse_perm(&perm)?;
        }

        if let Some(wait) = lookup("CONFIG_MIGRATE_WAIT_FOR_LOCK") {
            self.wait_for_lock = matches!(wait.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

/// Parse octal permission bits such as `644`, `0644` or `0o644`.
pub fn parse_perm(value: &str) -> Result<u32> {
    let digits = value.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let perm = u32::from_str_radix(digits, 8)
        .with_context(|| format!("invalid permission bits {value:?}"))?;
    anyhow::ensure!(perm <= 0o7777, "permission bits out of range: {value:?}");
    Ok(perm)
}
