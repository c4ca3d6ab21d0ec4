//! Versioned migrations for YAML and JSON config files.
//!
//! A migration is a partial config document. Applying it deep-merges the
//! migration into the current file: keys the migration introduces get their
//! default values, and values the user already set are kept as long as their
//! type did not change. The file records which migration it is at in its
//! top-level `version` and `force` keys.

pub mod cli;
pub mod codec;
pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod logging;
pub mod merge;
pub mod migrate;
pub mod paths;
pub mod placeholder;

pub use codec::{Codec, Format, JsonCodec, YamlCodec};
pub use config::Settings;
pub use document::{Document, NIL_VERSION};
pub use driver::{ConfigFile, Driver};
pub use error::{Error, Result};
pub use merge::merge;
pub use migrate::{Migration, Migrator, discover};
pub use placeholder::PlaceholderRegistry;
