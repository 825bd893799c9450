//! PatchOp interpreter (RFC 7644 §3.5.2).
//!
//! [`apply`] takes an already-coerced resource document and a PatchOp
//! envelope and returns the new document if anything changed, re-validating
//! the whole root against the schema after every operation so a later op in
//! the same request sees a consistent, canonical baseline.

use crate::error::{ScimError, ScimResult};
use crate::filter::Filter;
use crate::schema::{AttrType, Attribute, AttributeRef, Direction, SchemaDefinition};
use log::debug;
use serde_json::{Map, Value};

pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Add,
    Remove,
    Replace,
}

impl OpKind {
    fn parse(s: &str) -> ScimResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(OpKind::Add),
            "remove" => Ok(OpKind::Remove),
            "replace" => Ok(OpKind::Replace),
            other => Err(ScimError::invalid_syntax(format!("unknown patch op '{other}'"))),
        }
    }
}

/// A parsed `path`: `attr`, optionally scoped by a `[value-path]` filter,
/// optionally followed by a single trailing sub-attribute.
struct PatchPath {
    attr: String,
    value_filter: Option<Filter>,
    sub_attr: Option<String>,
}

impl PatchPath {
    fn parse(raw: &str) -> ScimResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScimError::invalid_path("empty patch path"));
        }
        if let Some(bracket_start) = raw.find('[') {
            let attr = raw[..bracket_start].to_string();
            let bracket_end = raw.rfind(']').ok_or_else(|| {
                ScimError::invalid_path(format!("unmatched '[' in path '{raw}'"))
            })?;
            if bracket_end < bracket_start {
                return Err(ScimError::invalid_path(format!("malformed path '{raw}'")));
            }
            let inner = &raw[bracket_start + 1..bracket_end];
            let value_filter = Some(Filter::parse(inner)?);
            let rest = raw[bracket_end + 1..].trim_start_matches('.');
            let sub_attr = if rest.is_empty() { None } else { Some(rest.to_string()) };
            Ok(Self { attr, value_filter, sub_attr })
        } else {
            Ok(Self { attr: raw.to_string(), value_filter: None, sub_attr: None })
        }
    }
}

/// Apply a PatchOp envelope to `resource`, returning the new document if it
/// changed, or `Ok(None)` if every operation was a no-op (RFC 7644 §3.5.2).
pub fn apply(resource: &Value, envelope: &Value, schema: &SchemaDefinition) -> ScimResult<Option<Value>> {
    validate_envelope(envelope)?;
    let operations = envelope["Operations"].as_array().unwrap();
    debug!("applying {} patch operation(s)", operations.len());

    let original = resource.clone();
    let mut current = resource.clone();

    for operation in operations {
        let op_obj = operation
            .as_object()
            .ok_or_else(|| ScimError::invalid_syntax("patch operation must be an object"))?;
        let op_kind = OpKind::parse(
            op_obj
                .get("op")
                .and_then(Value::as_str)
                .ok_or_else(|| ScimError::invalid_syntax("patch operation missing 'op'"))?,
        )?;
        let path = op_obj
            .get("path")
            .and_then(Value::as_str)
            .map(PatchPath::parse)
            .transpose()?;
        let value = op_obj.get("value");

        apply_one(&mut current, op_kind, path.as_ref(), value, schema)?;

        let before_coerce = current.clone();
        current = schema.coerce(&current, Direction::Both, None, Some(&before_coerce), None)?;
    }

    if original == current {
        debug!("patch produced no change");
        Ok(None)
    } else {
        Ok(Some(current))
    }
}

fn validate_envelope(envelope: &Value) -> ScimResult<()> {
    let schemas = envelope
        .get("schemas")
        .and_then(Value::as_array)
        .ok_or_else(|| ScimError::invalid_syntax("PatchOp envelope missing 'schemas'"))?;
    if schemas.len() != 1 || schemas[0].as_str() != Some(PATCH_OP_SCHEMA) {
        return Err(ScimError::invalid_syntax(format!(
            "PatchOp envelope 'schemas' must be exactly ['{PATCH_OP_SCHEMA}']"
        )));
    }
    let operations = envelope
        .get("Operations")
        .and_then(Value::as_array)
        .ok_or_else(|| ScimError::invalid_syntax("PatchOp envelope missing 'Operations'"))?;
    if operations.is_empty() {
        return Err(ScimError::invalid_value("PatchOp 'Operations' must not be empty"));
    }
    Ok(())
}

fn apply_one(
    current: &mut Value,
    op: OpKind,
    path: Option<&PatchPath>,
    value: Option<&Value>,
    schema: &SchemaDefinition,
) -> ScimResult<()> {
    let Some(path) = path else {
        return apply_root(current, op, value);
    };

    let attr = resolve_attribute(schema, &path.attr)?;
    let obj = current
        .as_object_mut()
        .ok_or_else(|| ScimError::internal("resource root is not an object"))?;
    let slot = obj.entry(attr.name.clone()).or_insert(Value::Null);

    if attr.multi_valued {
        apply_multi_valued(slot, attr, op, path, value)
    } else if attr.attr_type == AttrType::Complex {
        apply_complex(slot, attr, op, path, value)
    } else {
        apply_scalar(slot, op, value)
    }
}

fn resolve_attribute<'a>(schema: &'a SchemaDefinition, path: &str) -> ScimResult<&'a Attribute> {
    match schema.attribute(path)? {
        AttributeRef::Attribute(a) => Ok(a),
        AttributeRef::Extension(_) => Err(ScimError::invalid_path(format!(
            "'{path}' names an extension schema, not an attribute"
        ))),
    }
}

fn apply_root(current: &mut Value, op: OpKind, value: Option<&Value>) -> ScimResult<()> {
    match op {
        OpKind::Remove => Err(ScimError::no_target("'remove' requires a path")),
        OpKind::Add | OpKind::Replace => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            let patch_obj = value
                .as_object()
                .ok_or_else(|| ScimError::invalid_syntax("root patch 'value' must be an object"))?;
            let root = current
                .as_object_mut()
                .ok_or_else(|| ScimError::internal("resource root is not an object"))?;
            for (key, val) in patch_obj {
                merge_field(root, key, val.clone());
            }
            Ok(())
        }
    }
}

fn merge_field(root: &mut Map<String, Value>, key: &str, value: Value) {
    match (root.get_mut(key), &value) {
        (Some(Value::Array(existing)), Value::Array(incoming)) => {
            existing.extend(incoming.iter().cloned());
        }
        _ => {
            root.insert(key.to_string(), value);
        }
    }
}

fn apply_scalar(slot: &mut Value, op: OpKind, value: Option<&Value>) -> ScimResult<()> {
    match op {
        OpKind::Remove => {
            *slot = Value::Null;
            Ok(())
        }
        OpKind::Add | OpKind::Replace => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            *slot = value.clone();
            Ok(())
        }
    }
}

fn apply_complex(
    slot: &mut Value,
    attr: &Attribute,
    op: OpKind,
    path: &PatchPath,
    value: Option<&Value>,
) -> ScimResult<()> {
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    let obj = slot
        .as_object_mut()
        .ok_or_else(|| ScimError::invalid_syntax(format!("'{}' must be a complex object", attr.name)))?;

    match (&path.sub_attr, op) {
        (Some(sub), OpKind::Remove) => {
            obj.remove(sub);
            Ok(())
        }
        (Some(sub), OpKind::Add | OpKind::Replace) => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            obj.insert(sub.clone(), value.clone());
            Ok(())
        }
        (None, OpKind::Remove) => {
            obj.clear();
            Ok(())
        }
        (None, OpKind::Add | OpKind::Replace) => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            let patch_obj = value
                .as_object()
                .ok_or_else(|| ScimError::invalid_syntax(format!("'{}' must be a complex object", attr.name)))?;
            for (k, v) in patch_obj {
                obj.insert(k.clone(), v.clone());
            }
            Ok(())
        }
    }
}

fn apply_multi_valued(
    slot: &mut Value,
    attr: &Attribute,
    op: OpKind,
    path: &PatchPath,
    value: Option<&Value>,
) -> ScimResult<()> {
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    let array = slot
        .as_array_mut()
        .ok_or_else(|| ScimError::invalid_syntax(format!("'{}' must be an array", attr.name)))?;

    match &path.value_filter {
        None => apply_multi_valued_whole(array, attr, op, path.sub_attr.as_deref(), value),
        Some(filter) => apply_multi_valued_matched(array, attr, op, filter, path.sub_attr.as_deref(), value),
    }
}

fn apply_multi_valued_whole(
    array: &mut Vec<Value>,
    attr: &Attribute,
    op: OpKind,
    sub_attr: Option<&str>,
    value: Option<&Value>,
) -> ScimResult<()> {
    match op {
        OpKind::Remove => {
            if let Some(sub) = sub_attr {
                for item in array.iter_mut() {
                    if let Some(obj) = item.as_object_mut() {
                        obj.remove(sub);
                    }
                }
            } else {
                array.clear();
            }
            Ok(())
        }
        OpKind::Add => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            let incoming: Vec<Value> = match value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            for item in incoming {
                array.push(item);
            }
            demote_extra_primaries(array);
            Ok(())
        }
        OpKind::Replace => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            if let Some(sub) = sub_attr {
                for item in array.iter_mut() {
                    if let Some(obj) = item.as_object_mut() {
                        obj.insert(sub.to_string(), value.clone());
                    }
                }
            } else {
                *array = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
            }
            demote_extra_primaries(array);
            let _ = attr;
            Ok(())
        }
    }
}

fn apply_multi_valued_matched(
    array: &mut Vec<Value>,
    _attr: &Attribute,
    op: OpKind,
    filter: &Filter,
    sub_attr: Option<&str>,
    value: Option<&Value>,
) -> ScimResult<()> {
    let matched_count = array.iter().filter(|item| filter.is_satisfied_by(item, None)).count();

    match op {
        OpKind::Remove => {
            if let Some(sub) = sub_attr {
                for item in array.iter_mut() {
                    if filter.is_satisfied_by(item, None) {
                        if let Some(obj) = item.as_object_mut() {
                            obj.remove(sub);
                        }
                    }
                }
            } else {
                array.retain(|item| !filter.is_satisfied_by(item, None));
            }
            Ok(())
        }
        OpKind::Add => {
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            for item in array.iter_mut() {
                if filter.is_satisfied_by(item, None) {
                    apply_value_to_matched(item, sub_attr, value)?;
                }
            }
            demote_extra_primaries(array);
            Ok(())
        }
        OpKind::Replace => {
            if matched_count == 0 {
                return Err(ScimError::no_target(format!(
                    "value-path filter '{}' matched no elements",
                    filter.to_canonical_string()
                )));
            }
            let value = value.ok_or_else(|| ScimError::invalid_value("'value' is required"))?;
            for item in array.iter_mut() {
                if filter.is_satisfied_by(item, None) {
                    apply_value_to_matched(item, sub_attr, value)?;
                }
            }
            demote_extra_primaries(array);
            Ok(())
        }
    }
}

fn apply_value_to_matched(item: &mut Value, sub_attr: Option<&str>, value: &Value) -> ScimResult<()> {
    match sub_attr {
        Some(sub) => {
            let obj = item
                .as_object_mut()
                .ok_or_else(|| ScimError::invalid_syntax("matched element is not an object"))?;
            obj.insert(sub.to_string(), value.clone());
            Ok(())
        }
        None => {
            let obj = item
                .as_object_mut()
                .ok_or_else(|| ScimError::invalid_syntax("matched element is not an object"))?;
            if let Some(patch_obj) = value.as_object() {
                for (k, v) in patch_obj {
                    obj.insert(k.clone(), v.clone());
                }
            }
            Ok(())
        }
    }
}

/// When more than one element carries `primary: true`, keep only the last
/// one that was added/replaced and demote the rest. RFC 7643 doesn't mandate
/// this; it's a library convention for resolving ambiguous `primary` sets.
fn demote_extra_primaries(array: &mut [Value]) {
    let primary_indices: Vec<usize> = array
        .iter()
        .enumerate()
        .filter(|(_, item)| item.get("primary").and_then(Value::as_bool) == Some(true))
        .map(|(i, _)| i)
        .collect();
    if primary_indices.len() <= 1 {
        return;
    }
    let keep = *primary_indices.last().unwrap();
    for &idx in &primary_indices {
        if idx != keep {
            if let Some(obj) = array[idx].as_object_mut() {
                obj.insert("primary".to_string(), Value::Bool(false));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrType, Attribute, SchemaDefinition};
    use serde_json::json;

    fn test_schema() -> SchemaDefinition {
        SchemaDefinition::new(
            "urn:ietf:params:scim:schemas:core:2.0:User",
            "User",
            "",
            vec![
                Attribute::primitive("userName", AttrType::String),
                Attribute::complex(
                    "emails",
                    vec![
                        Attribute::primitive("value", AttrType::String),
                        Attribute::primitive("type", AttrType::String),
                        Attribute::primitive("primary", AttrType::Boolean),
                    ],
                )
                .multi_valued(true),
            ],
        )
        .unwrap()
    }

    fn envelope(ops: Value) -> Value {
        json!({"schemas": [PATCH_OP_SCHEMA], "Operations": ops})
    }

    #[test]
    fn add_to_multi_valued_demotes_prior_primary() {
        let schema = test_schema();
        let resource = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "emails": [{"value": "a@x", "primary": true}]
        });
        let env = envelope(json!([
            {"op": "add", "path": "emails", "value": {"value": "b@x", "primary": true}}
        ]));
        let result = apply(&resource, &env, &schema).unwrap().unwrap();
        let emails = result["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0]["primary"], json!(false));
        assert_eq!(emails[1]["primary"], json!(true));
    }

    #[test]
    fn value_path_remove_drops_matching_element() {
        let schema = test_schema();
        let resource = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "emails": [
                {"value": "a@x", "type": "work"},
                {"value": "b@x", "type": "home"}
            ]
        });
        let env = envelope(json!([
            {"op": "remove", "path": "emails[type eq \"work\"]"}
        ]));
        let result = apply(&resource, &env, &schema).unwrap().unwrap();
        let emails = result["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0]["value"], json!("b@x"));
    }

    #[test]
    fn replace_with_non_matching_value_path_fails_no_target() {
        let schema = test_schema();
        let resource = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "emails": [{"value": "a@x", "type": "work"}]
        });
        let env = envelope(json!([
            {"op": "replace", "path": "emails[type eq \"other\"]", "value": {"value": "z@x"}}
        ]));
        let err = apply(&resource, &env, &schema).unwrap_err();
        assert_eq!(err.scim_type(), Some(crate::error::ScimType::NoTarget));
    }

    #[test]
    fn remove_without_path_fails() {
        let schema = test_schema();
        let resource = json!({"schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"]});
        let env = envelope(json!([{"op": "remove"}]));
        assert!(apply(&resource, &env, &schema).is_err());
    }

    #[test]
    fn no_op_returns_none() {
        let schema = test_schema();
        let resource = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "userName": "bjensen"
        });
        let env = envelope(json!([
            {"op": "replace", "path": "userName", "value": "bjensen"}
        ]));
        let result = apply(&resource, &env, &schema).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn scalar_replace_overwrites() {
        let schema = test_schema();
        let resource = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "userName": "old"
        });
        let env = envelope(json!([
            {"op": "replace", "path": "userName", "value": "new"}
        ]));
        let result = apply(&resource, &env, &schema).unwrap().unwrap();
        assert_eq!(result["userName"], json!("new"));
    }
}
