//! JSON codec backed by `serde_json`.

use super::{Codec, CodecError, VersionFields, is_blank, value_kind};
use crate::document::Document;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

/// JSON config files, written with four-space indentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        if is_blank(bytes) {
            return Ok(Document::new());
        }
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(CodecError::NotAMapping(value_kind(&other))),
        }
    }

    fn encode(&self, doc: &Document) -> Result<String, CodecError> {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        doc.serialize(&mut ser)?;
        buf.push(b'\n');
        // serde_json only emits valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn extract_version(&self, bytes: &[u8]) -> Result<(i64, bool), CodecError> {
        if is_blank(bytes) {
            return Ok((0, false));
        }
        let fields: VersionFields = serde_json::from_slice(bytes)?;
        Ok((fields.version, fields.force))
    }

    fn empty_document(&self) -> &'static [u8] {
        b"{}"
    }
}
