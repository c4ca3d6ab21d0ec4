//! The untyped document model shared by the merger, the codecs and the driver.

use serde_json::{Map, Value};

/// A decoded config file or migration: string keys mapped to values.
///
/// Key order follows the source file, so a rewrite keeps the user's layout.
pub type Document = Map<String, Value>;

/// Reserved key holding the applied migration version.
pub const VERSION_KEY: &str = "version";

/// Reserved key holding the dirty flag.
pub const FORCE_KEY: &str = "force";

/// Version reported when no migration has been recorded.
pub const NIL_VERSION: i64 = -1;

/// Remove `version` and `force` from a document, keeping the order of the rest.
pub fn strip_version_keys(doc: &mut Document) {
    doc.shift_remove(VERSION_KEY);
    doc.shift_remove(FORCE_KEY);
}

/// Build a document with `version` and `force` leading the existing keys.
pub fn with_version_keys(doc: Document, version: i64, dirty: bool) -> Document {
    let mut out = Document::with_capacity(doc.len() + 2);
    out.insert(VERSION_KEY.to_string(), Value::from(version));
    out.insert(FORCE_KEY.to_string(), Value::Bool(dirty));
    for (key, value) in doc {
        if key != VERSION_KEY && key != FORCE_KEY {
            out.insert(key, value);
        }
    }
    out
}
