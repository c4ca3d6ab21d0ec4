//! Serialization formats for config files and migrations.
//!
//! A [`Codec`] turns bytes into a [`Document`] and back, and knows how to read
//! just the version metadata. Formats are picked when the driver is built.

mod json;
mod yaml;

pub use json::JsonCodec;
pub use yaml::YamlCodec;

use crate::document::Document;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// `.inf` or `.nan` at the given key path; the document model only holds
    /// finite numbers.
    #[error("non-finite number at {0} is not supported")]
    NonFinite(String),

    /// The document's top level is not a mapping.
    #[error("expected a mapping at the top level, found {0}")]
    NotAMapping(&'static str),
}

/// Version metadata as stored in a config file.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct VersionFields {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub force: bool,
}

/// Encoding capability used by the driver.
pub trait Codec: Send + Sync {
    /// Short format name, e.g. `yaml`.
    fn name(&self) -> &'static str;

    /// Decode bytes into a document. Empty input is an empty document.
    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError>;

    /// Encode a document.
    fn encode(&self, doc: &Document) -> Result<String, CodecError>;

    /// Read only `version` and `force`; missing fields default to `0`/`false`.
    fn extract_version(&self, bytes: &[u8]) -> Result<(i64, bool), CodecError>;

    /// Contents written by a drop.
    fn empty_document(&self) -> &'static [u8];

    /// Remove literal `null` tokens the encoder wrote for absent values.
    fn strip_nulls(&self, encoded: String) -> String {
        encoded
    }

    /// Remove quote characters the encoder added but the format does not need.
    fn strip_quotes(&self, encoded: String) -> String {
        encoded
    }
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// Format named by a URL scheme such as `yaml://` or `json://`.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// The codec for this format.
    pub fn codec(self) -> Arc<dyn Codec> {
        match self {
            Format::Yaml => Arc::new(YamlCodec),
            Format::Json => Arc::new(JsonCodec),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Json => write!(f, "json"),
        }
    }
}

pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}

pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}
