//! Deep merge of a migration document into an existing config document.
//!
//! The migration (`new`) decides the *shape*: its key set at every level is
//! authoritative, and its array-of-maps entries act as templates. The existing
//! file (`old`) supplies *state*: scalar values, nulls and the length of
//! arrays of maps, so edits made since the last migration survive.
//!
//! Rules, applied per key of `old` that also exists in `new`:
//! - map vs map: merged recursively
//! - array of maps vs array: positional merge (see [`merge_sequences`])
//! - array vs array, either empty: the new array is kept
//! - scalar array vs array: the old array wins as a whole
//! - old is null: the result is null
//! - same scalar kind (string, number, bool): the old value wins
//! - anything else: the new value is kept
//!
//! **Keys present in `old` but missing from `new` are dropped.** An empty
//! migration therefore produces an empty document, not the old one. Every
//! migration must restate the keys it wants to keep.
//!
//! `version` and `force` are stripped from both sides; only the driver
//! writes them.

use crate::document::{Document, strip_version_keys};
use crate::placeholder::PlaceholderRegistry;
use serde_json::Value;

/// Merge `new` into `old` and resolve placeholders in the result.
///
/// # Example
/// ```
/// use serde_json::json;
/// use config_migrate::merge::merge;
/// use config_migrate::placeholder::PlaceholderRegistry;
///
/// let new = json!({"http": {"port": 8080, "host": "0.0.0.0"}});
/// let old = json!({"http": {"port": 9000}, "legacy": true});
/// let merged = merge(
///     new.as_object().unwrap().clone(),
///     old.as_object().unwrap().clone(),
///     &PlaceholderRegistry::new(),
/// );
/// assert_eq!(
///     serde_json::Value::Object(merged),
///     json!({"http": {"port": 9000, "host": "0.0.0.0"}})
/// );
/// ```
pub fn merge(mut new: Document, mut old: Document, placeholders: &PlaceholderRegistry) -> Document {
    strip_version_keys(&mut new);
    strip_version_keys(&mut old);

    let mut out = merge_maps(new, old);
    if placeholders.has_placeholders() {
        for value in out.values_mut() {
            resolve_placeholders(value, placeholders);
        }
    }
    out
}

/// Merge without placeholder resolution or version-key handling.
pub fn merge_maps(mut out: Document, old: Document) -> Document {
    if out.is_empty() {
        return Document::new();
    }

    for (key, old_value) in old {
        // Keys only in the old document are dropped.
        if let Some(slot) = out.get_mut(&key) {
            let new_value = std::mem::take(slot);
            *slot = reconcile(new_value, old_value);
        }
    }
    out
}

fn reconcile(new: Value, old: Value) -> Value {
    match (new, old) {
        (Value::Object(new), Value::Object(old)) => Value::Object(merge_maps(new, old)),
        (Value::Array(new), Value::Array(old)) => merge_sequences(new, old),
        (_, Value::Null) => Value::Null,
        (new, old) if same_scalar_kind(&new, &old) => old,
        (new, _) => new,
    }
}

/// Merge two arrays.
///
/// When the new array holds maps, the result follows the old array's length.
/// Element `i` of the old array is merged against `new[i]`, or against the
/// last new template once the new array runs out. Old elements that are not
/// maps are replaced by their template while one exists at the same index and
/// dropped afterwards.
pub fn merge_sequences(new: Vec<Value>, old: Vec<Value>) -> Value {
    if new.is_empty() || old.is_empty() {
        return Value::Array(new);
    }

    let mut template = match new.first() {
        Some(Value::Object(first)) => first.clone(),
        // Arrays of scalars are kept whole, like any other scalar.
        _ => return Value::Array(old),
    };

    let mut out = Vec::with_capacity(old.len());
    for (i, old_elem) in old.into_iter().enumerate() {
        if let Some(Value::Object(next)) = new.get(i) {
            template = next.clone();
        }
        match old_elem {
            Value::Object(old_map) => out.push(Value::Object(merge_maps(template.clone(), old_map))),
            _ if i < new.len() => out.push(Value::Object(template.clone())),
            _ => {}
        }
    }
    Value::Array(out)
}

fn same_scalar_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::String(_), Value::String(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

fn resolve_placeholders(value: &mut Value, placeholders: &PlaceholderRegistry) {
    match value {
        Value::String(s) => *s = placeholders.resolve(s),
        Value::Array(items) => {
            for item in items {
                resolve_placeholders(item, placeholders);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                resolve_placeholders(item, placeholders);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn merged(new: Value, old: Value) -> Value {
        Value::Object(merge(doc(new), doc(old), &PlaceholderRegistry::new()))
    }

    #[test]
    fn test_empty_maps() {
        assert_eq!(merged(json!({}), json!({})), json!({}));
        assert_eq!(merged(json!({"foo": "bar"}), json!({})), json!({"foo": "bar"}));
    }

    #[test]
    fn test_empty_new_drops_everything() {
        assert_eq!(merged(json!({}), json!({"foo": "bar", "n": {"a": 1}})), json!({}));
    }

    #[test]
    fn test_old_scalar_wins() {
        assert_eq!(merged(json!({"a": 1}), json!({"a": 2})), json!({"a": 2}));
        assert_eq!(merged(json!({"s": "new"}), json!({"s": "old"})), json!({"s": "old"}));
        assert_eq!(merged(json!({"b": false}), json!({"b": true})), json!({"b": true}));
    }

    #[test]
    fn test_integer_and_float_are_one_kind() {
        assert_eq!(merged(json!({"a": 1}), json!({"a": 2.5})), json!({"a": 2.5}));
    }

    #[test]
    fn test_new_key_added() {
        assert_eq!(
            merged(json!({"a": 1, "b": 2}), json!({"a": 1})),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_old_key_missing_from_new_is_dropped() {
        assert_eq!(merged(json!({"a": 1}), json!({"a": 1, "c": 3})), json!({"a": 1}));
        assert_eq!(merged(json!({"foo2": "bar"}), json!({"foo": "bar"})), json!({"foo2": "bar"}));
    }

    #[test]
    fn test_old_null_stays_null() {
        for new in [json!(true), json!("bar"), json!(1), json!({"bar": "bar"}), json!(["bar"])] {
            assert_eq!(merged(json!({"foo": new}), json!({"foo": null})), json!({"foo": null}));
        }
    }

    #[test]
    fn test_type_mismatch_keeps_new() {
        assert_eq!(
            merged(json!({"v": {"nested": true}}), json!({"v": 42})),
            json!({"v": {"nested": true}})
        );
        assert_eq!(merged(json!({"v": 1}), json!({"v": [1, 2]})), json!({"v": 1}));
        assert_eq!(merged(json!({"v": "1"}), json!({"v": 1})), json!({"v": "1"}));
        assert_eq!(merged(json!({"v": null}), json!({"v": 1})), json!({"v": null}));
    }

    #[test]
    fn test_nested_maps() {
        assert_eq!(
            merged(
                json!({"db": {"dsn": "default", "max_open_conn": 10}}),
                json!({"db": {"dsn": "postgres://prod", "gone": 1}})
            ),
            json!({"db": {"dsn": "postgres://prod", "max_open_conn": 10}})
        );
    }

    #[test]
    fn test_positional_array_of_maps() {
        assert_eq!(
            merged(
                json!({"arr": [{"x": 1, "y": 2}]}),
                json!({"arr": [{"x": 9}, {"x": 9}]})
            ),
            json!({"arr": [{"x": 9, "y": 2}, {"x": 9, "y": 2}]})
        );
    }

    #[test]
    fn test_positional_uses_matching_template() {
        assert_eq!(
            merged(
                json!({"arr": [{"a": 1}, {"b": 2}]}),
                json!({"arr": [{"a": 5}, {"b": 6}, {"b": 7, "z": 0}]})
            ),
            json!({"arr": [{"a": 5}, {"b": 6}, {"b": 7}]})
        );
    }

    #[test]
    fn test_array_of_maps_over_scalar_array() {
        assert_eq!(
            merged(
                json!({"foo6": [{"foo6_1": "bar", "foo6_2": 1}]}),
                json!({"foo6": [1, 2, 3]})
            ),
            json!({"foo6": [{"foo6_1": "bar", "foo6_2": 1}]})
        );
    }

    #[test]
    fn test_empty_arrays_keep_new() {
        assert_eq!(merged(json!({"a": []}), json!({"a": [{"x": 1}]})), json!({"a": []}));
        assert_eq!(merged(json!({"a": [{"x": 1}]}), json!({"a": []})), json!({"a": [{"x": 1}]}));
    }

    #[test]
    fn test_scalar_arrays_old_wins_whole() {
        assert_eq!(
            merged(json!({"a": [1, 2, 3, 4, 5]}), json!({"a": [1, 2, 3]})),
            json!({"a": [1, 2, 3]})
        );
        assert_eq!(
            merged(json!({"a": ["x"]}), json!({"a": ["y", "z"]})),
            json!({"a": ["y", "z"]})
        );
    }

    #[test]
    fn test_version_keys_stripped() {
        assert_eq!(
            merged(
                json!({"version": 1, "force": false, "a": 1}),
                json!({"version": 7, "force": true, "a": 2})
            ),
            json!({"a": 2})
        );
    }

    #[test]
    fn test_merge_with_itself_is_identity() {
        let d = json!({"a": 1, "b": {"c": "x", "d": {"e": true}}, "n": null});
        assert_eq!(merged(d.clone(), d.clone()), d);
    }

    #[test]
    fn test_placeholders_resolved_in_result() {
        let registry = PlaceholderRegistry::new();
        registry.register("secret", || "s3cr3t".to_string()).unwrap();

        let out = merge(
            doc(json!({
                "key": "___secret___",
                "list": ["a-___secret___", 1],
                "nested": {"inner": "___secret___"},
                "kept": "new"
            })),
            doc(json!({"kept": "old-___secret___"})),
            &registry,
        );
        assert_eq!(
            Value::Object(out),
            json!({
                "key": "s3cr3t",
                "list": ["a-s3cr3t", 1],
                "nested": {"inner": "s3cr3t"},
                "kept": "old-s3cr3t"
            })
        );
    }

    #[test]
    fn test_result_follows_new_key_order() {
        let out = merge(
            doc(json!({"z": 1, "a": 2, "m": 3})),
            doc(json!({"a": 9, "z": 8})),
            &PlaceholderRegistry::new(),
        );
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }
}
