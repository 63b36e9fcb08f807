//! Comparing desired attributes with what NetBox currently has.
//!
//! Only fields mentioned in the desired state are compared. NetBox renders
//! foreign keys as nested objects and choice fields as `{value, label}`, so
//! remote values are reduced to the shape a user writes before comparing.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Reduce a remote value to its comparable form: nested objects to their
/// `id`, choices to their `value`, recursively through lists.
pub fn normalize_remote(value: &Value) -> Value {
    match value {
        Value::Object(o) => {
            if let Some(id) = o.get("id") {
                id.clone()
            } else if o.contains_key("value") && o.contains_key("label") {
                o["value"].clone()
            } else {
                value.clone()
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_remote).collect()),
        _ => value.clone(),
    }
}

fn as_set(items: &[Value]) -> BTreeSet<String> {
    items.iter().map(Value::to_string).collect()
}

/// Whether `remote` already satisfies `desired`. Lists are compared as sets.
pub fn values_equal(desired: &Value, remote: &Value) -> bool {
    match (desired, normalize_remote(remote)) {
        (Value::Array(d), Value::Array(r)) => as_set(d) == as_set(&r),
        (Value::Array(d), Value::Null) => d.is_empty(),
        (d, r) => *d == r,
    }
}

/// The fields of `desired` whose value differs from `remote`.
pub fn changeset(desired: &Map<String, Value>, remote: &Value) -> Map<String, Value> {
    desired
        .iter()
        .filter(|(field, value)| !values_equal(value, remote.get(*field).unwrap_or(&Value::Null)))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

/// Before/after view of a change, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diff {
    pub before: Value,
    pub after: Value,
}

impl Diff {
    pub fn created() -> Self {
        Diff {
            before: json!({"state": "absent"}),
            after: json!({"state": "present"}),
        }
    }

    pub fn deleted() -> Self {
        Diff {
            before: json!({"state": "present"}),
            after: json!({"state": "absent"}),
        }
    }

    /// The remote values of the changed fields against their new values.
    pub fn updated(remote: &Value, changes: &Map<String, Value>) -> Self {
        let before = changes
            .keys()
            .map(|k| {
                let v = remote.get(k).map(normalize_remote).unwrap_or(Value::Null);
                (k.clone(), v)
            })
            .collect();
        Diff {
            before: Value::Object(before),
            after: Value::Object(changes.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn nested_objects_compare_by_id() {
        assert!(values_equal(
            &json!(12),
            &json!({"id": 12, "name": "Test Device", "url": "http://x/api/dcim/devices/12/"})
        ));
        assert!(!values_equal(&json!(13), &json!({"id": 12})));
    }

    #[test]
    fn choices_compare_by_value() {
        assert!(values_equal(
            &json!("active"),
            &json!({"value": "active", "label": "Active"})
        ));
    }

    #[test]
    fn lists_compare_as_sets() {
        let remote = json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]);
        assert!(values_equal(&json!([2, 1]), &remote));
        assert!(values_equal(&json!([1, 2, 2]), &remote));
        assert!(!values_equal(&json!([1]), &remote));
        assert!(values_equal(&json!([]), &Value::Null));
    }

    #[test]
    fn reordered_tags_give_empty_changeset() {
        let desired = map(json!({"master": 12, "tags": [3, 1, 2]}));
        let remote = json!({
            "id": 5,
            "master": {"id": 12},
            "tags": [{"id": 1}, {"id": 2}, {"id": 3}],
        });
        assert!(changeset(&desired, &remote).is_empty());
    }

    #[test]
    fn changeset_ignores_unmentioned_fields() {
        let desired = map(json!({"master": 12, "domain": "Domain Text"}));
        let remote = json!({
            "id": 5,
            "name": "VC 1",
            "master": {"id": 12},
            "domain": "",
            "description": "something else entirely",
        });
        assert_eq!(
            Value::Object(changeset(&desired, &remote)),
            json!({"domain": "Domain Text"})
        );
    }

    #[test]
    fn missing_remote_field_is_a_change() {
        let desired = map(json!({"domain": "x"}));
        assert_eq!(
            Value::Object(changeset(&desired, &json!({"id": 1}))),
            json!({"domain": "x"})
        );
    }

    #[test]
    fn update_diff() {
        let remote = json!({"id": 5, "domain": "old", "master": {"id": 12}});
        let changes = map(json!({"domain": "new"}));
        let diff = Diff::updated(&remote, &changes);
        assert_eq!(diff.before, json!({"domain": "old"}));
        assert_eq!(diff.after, json!({"domain": "new"}));
    }
}
