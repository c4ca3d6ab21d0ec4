//! Placeholder substitution for string values.
//!
//! A placeholder is a name wrapped in triple underscores, e.g. `___random___`.
//! Each name maps to a resolver producing the replacement text. Resolvers may
//! be non-deterministic: within one [`PlaceholderRegistry::resolve`] call every
//! occurrence of a name receives the same value, but separate calls (and
//! separate strings) get fresh values.
//!
//! The registry is built once at startup and shared by reference; it is not
//! process-global state.

pub mod builtin;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Delimiter wrapped around placeholder names.
pub const DELIMITER: &str = "___";

/// A zero-argument resolver producing the replacement text.
pub type Resolver = Arc<dyn Fn() -> String + Send + Sync>;

/// Registration failures. These are wiring mistakes, reported when the
/// registry is built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("placeholder {0:?} is already registered")]
    Duplicate(String),

    #[error("invalid placeholder name {0:?}")]
    InvalidName(String),
}

/// Render the token for a placeholder name.
pub fn token(name: &str) -> String {
    format!("{DELIMITER}{name}{DELIMITER}")
}

/// Named resolvers applied to string leaves during a merge.
#[derive(Default)]
pub struct PlaceholderRegistry {
    resolvers: RwLock<BTreeMap<String, Resolver>>,
}

impl PlaceholderRegistry {
    /// An empty registry. Merges using it leave strings untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in resolvers
    /// (see [`builtin::register_all`]).
    pub fn with_builtins() -> Result<Self, PlaceholderError> {
        let registry = Self::new();
        builtin::register_all(&registry)?;
        Ok(registry)
    }

    /// Register a resolver under `name` (without delimiters).
    pub fn register<F>(&self, name: &str, resolver: F) -> Result<(), PlaceholderError>
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        if name.is_empty() || name.contains(DELIMITER) || name.chars().any(char::is_whitespace) {
            return Err(PlaceholderError::InvalidName(name.to_string()));
        }

        let mut resolvers = self
            .resolvers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if resolvers.contains_key(name) {
            return Err(PlaceholderError::Duplicate(name.to_string()));
        }
        resolvers.insert(name.to_string(), Arc::new(resolver));
        Ok(())
    }

    /// True if at least one resolver is registered.
    pub fn has_placeholders(&self) -> bool {
        !self
            .resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Replace every registered token occurring in `value`.
    pub fn resolve(&self, value: &str) -> String {
        if !value.contains(DELIMITER) {
            return value.to_string();
        }

        // Snapshot so resolvers run without the lock held.
        let resolvers: Vec<(String, Resolver)> = self
            .resolvers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, resolver)| (token(name), Arc::clone(resolver)))
            .collect();

        let mut out = value.to_string();
        for (token, resolver) in resolvers {
            if out.contains(&token) {
                let replacement = resolver();
                out = out.replace(&token, &replacement);
            }
        }
        out
    }
}

impl std::fmt::Debug for PlaceholderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderRegistry")
            .field("names", &self.names())
            .finish()
    }
}
