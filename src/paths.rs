//! Resolution of driver targets to absolute file paths.
//!
//! Accepted forms:
//! - bare paths: `config.yaml`, `/etc/app/config.yaml`
//! - authority URLs: `yaml://config.yaml`, `yaml://./conf/app.yaml`, `file:///abs/app.yaml`
//! - opaque URLs: `yaml:config.yaml`
//!
//! Query strings and fragments are discarded and percent-escapes decoded. An
//! empty path means the current working directory; relative paths are made
//! absolute against it.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// A resolved driver target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Lowercased URL scheme, e.g. `yaml` for `yaml://config.yaml`.
    pub scheme: Option<String>,
    /// Absolute, normalized file path.
    pub path: PathBuf,
}

/// Turn a URL-like target into an absolute, normalized path.
pub fn resolve_url(url: &str) -> Result<PathBuf> {
    resolve_target(url).map(|target| target.path)
}

/// Like [`resolve_url`], but also report the scheme the target was given with.
pub fn resolve_target(url: &str) -> Result<Target> {
    let invalid = |reason: &str| Error::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }

    let (scheme, rest) = match split_scheme(url) {
        Scheme::Found(scheme, rest) => (Some(scheme.to_ascii_lowercase()), rest),
        Scheme::None => (None, url),
        Scheme::ColonInFirstSegment => {
            return Err(invalid("first path segment cannot contain a colon"));
        }
    };

    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let raw = match rest.strip_prefix("//") {
        // host + path, e.g. `yaml://./conf/app.yaml` -> `./conf/app.yaml`
        Some(authority) => authority.to_string(),
        None => rest.to_string(),
    };

    let decoded = urlencoding::decode(&raw).map_err(|_| invalid("invalid percent-encoding"))?;
    Ok(Target {
        scheme,
        path: absolutize(Path::new(decoded.as_ref()))?,
    })
}

enum Scheme<'a> {
    Found(&'a str, &'a str),
    None,
    ColonInFirstSegment,
}

fn split_scheme(url: &str) -> Scheme<'_> {
    let Some(colon) = url.find(':') else {
        return Scheme::None;
    };
    let candidate = &url[..colon];

    let mut chars = candidate.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        return Scheme::Found(candidate, &url[colon + 1..]);
    }

    if candidate.contains('/') {
        // The colon sits in a later segment, e.g. `dir/a:b.yaml`.
        Scheme::None
    } else {
        Scheme::ColonInFirstSegment
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    let cwd = || {
        std::env::current_dir().map_err(|e| Error::io("read current directory", PathBuf::from("."), e))
    };

    let absolute = if path.as_os_str().is_empty() {
        cwd()?
    } else if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd()?.join(path)
    };
    Ok(normalize_path_components(&absolute))
}

/// Resolve `.` and `..` lexically, without touching the filesystem.
pub fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => components.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else if !matches!(components.last(), Some(Component::RootDir)) {
                    components.push(Component::ParentDir);
                }
            }
            Component::Normal(name) => components.push(Component::Normal(name)),
        }
    }

    components.iter().collect()
}
