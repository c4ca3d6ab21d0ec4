//! YAML codec backed by `serde_yaml`.

use super::{Codec, CodecError, VersionFields, is_blank, value_kind};
use crate::document::Document;
use serde_json::Value;

/// YAML config files.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        if is_blank(bytes) {
            return Ok(Document::new());
        }
        let yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        reject_non_finite(&yaml, "")?;
        match serde_yaml::from_value::<Value>(yaml)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Document::new()),
            other => Err(CodecError::NotAMapping(value_kind(&other))),
        }
    }

    fn encode(&self, doc: &Document) -> Result<String, CodecError> {
        Ok(serde_yaml::to_string(doc)?)
    }

    fn extract_version(&self, bytes: &[u8]) -> Result<(i64, bool), CodecError> {
        if is_blank(bytes) {
            return Ok((0, false));
        }
        let fields: VersionFields = serde_yaml::from_slice(bytes)?;
        Ok((fields.version, fields.force))
    }

    fn empty_document(&self) -> &'static [u8] {
        b""
    }

    /// `key: null` becomes `key:` and `- null` becomes `-`; both still read
    /// back as null. Block scalar bodies are left alone.
    fn strip_nulls(&self, encoded: String) -> String {
        rewrite_lines(&encoded, |body| {
            let Some(prefix) = body.strip_suffix(" null") else {
                return None;
            };
            if prefix.ends_with(':') || prefix.trim_start() == "-" {
                Some(prefix.to_string())
            } else {
                None
            }
        })
    }

    /// Unquote single-quoted scalar values that read back as the same string
    /// without quotes.
    fn strip_quotes(&self, encoded: String) -> String {
        rewrite_lines(&encoded, unquote_line)
    }
}

/// Fail on `.inf`, `-.inf` and `.nan`, which have no counterpart in the
/// document model and would otherwise decode as null.
fn reject_non_finite(value: &serde_yaml::Value, at: &str) -> Result<(), CodecError> {
    match value {
        serde_yaml::Value::Number(n) if n.is_infinite() || n.is_nan() => {
            let at = if at.is_empty() { "<root>" } else { at };
            Err(CodecError::NonFinite(at.to_string()))
        }
        serde_yaml::Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                reject_non_finite(item, &format!("{at}[{i}]"))?;
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(map) => {
            for (key, item) in map {
                let key = match key.as_str() {
                    Some(key) => key.to_string(),
                    None => format!("{key:?}"),
                };
                let path = if at.is_empty() { key } else { format!("{at}.{key}") };
                reject_non_finite(item, &path)?;
            }
            Ok(())
        }
        serde_yaml::Value::Tagged(tagged) => reject_non_finite(&tagged.value, at),
        _ => Ok(()),
    }
}

/// Apply `rewrite` to each line outside block scalars.
fn rewrite_lines(encoded: &str, rewrite: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(encoded.len());
    let mut block_parent: Option<usize> = None;

    for line in encoded.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        let indent = body.len() - body.trim_start().len();

        if let Some(parent) = block_parent {
            if body.trim().is_empty() || indent > parent {
                out.push_str(line);
                continue;
            }
            block_parent = None;
        }
        if opens_block_scalar(body) {
            block_parent = Some(indent);
        }

        match rewrite(body) {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(body),
        }
        out.push_str(newline);
    }
    out
}

/// True for `key: |-`, `- >`, `|2` and similar block scalar headers.
fn opens_block_scalar(body: &str) -> bool {
    let trimmed = body.trim_end();
    let Some(header) = trimmed.rsplit(' ').next() else {
        return false;
    };
    let mut chars = header.chars();
    let is_header = matches!(chars.next(), Some('|' | '>'))
        && header.len() <= 3
        && chars.all(|c| c.is_ascii_digit() || c == '-' || c == '+');
    if !is_header {
        return false;
    }
    let lead = trimmed[..trimmed.len() - header.len()].trim();
    lead.is_empty() || lead == "-" || lead.ends_with(':')
}

fn unquote_line(body: &str) -> Option<String> {
    let trimmed = body.trim_start();
    let indent = &body[..body.len() - trimmed.len()];

    // `- 'value'` or `- key: 'value'`
    if let Some(item) = trimmed.strip_prefix("- ") {
        if item.starts_with('\'') {
            let bare = unquote_scalar(item, |bare| format!("- {bare}"))?;
            return Some(format!("{indent}- {bare}"));
        }
        let rest = unquote_line(item)?;
        return Some(format!("{indent}- {rest}"));
    }

    // `key: 'value'`; quoted keys are left alone.
    if trimmed.starts_with(['\'', '"']) {
        return None;
    }
    let (key, value) = trimmed.split_once(": ")?;
    let bare = unquote_scalar(value, |bare| format!("k: {bare}"))?;
    Some(format!("{indent}{key}: {bare}"))
}

/// Return the unquoted text of a `'...'` scalar if `probe(bare)` still parses
/// to the same string.
fn unquote_scalar(value: &str, probe: impl Fn(&str) -> String) -> Option<String> {
    let inner = value.strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.is_empty() {
        return None;
    }
    if inner.replace("''", "").contains('\'') {
        // A lone quote inside means the value ended earlier.
        return None;
    }
    let unescaped = inner.replace("''", "'");

    let expected = Value::String(unescaped.clone());
    let parsed: Value = serde_yaml::from_str(&probe(&unescaped)).ok()?;
    let same = match parsed {
        Value::Object(map) => map.len() == 1 && map.get("k") == Some(&expected),
        Value::Array(items) => items.len() == 1 && items[0] == expected,
        _ => false,
    };
    same.then_some(unescaped)
}
