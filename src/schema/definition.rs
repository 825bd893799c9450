//! Schema definitions: an ordered collection of attributes plus document-
//! level coercion, lookup, extension and truncation (RFC 7643 §3, §7).

use super::attribute::{AttrType, Attribute, Direction, Mutability, Returned, Uniqueness};
use crate::error::{ScimError, ScimResult};
use crate::filter::{AttributeCaseResolver, Filter, Leaf};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A direct attribute, or a reference to an attached extension schema
/// (RFC 7643 §3.3 schema extensions).
#[derive(Clone)]
enum AttrSlot {
    Attribute(Attribute),
    Extension {
        definition: Arc<SchemaDefinition>,
        required: bool,
    },
}

/// An ordered collection of [`Attribute`]s plus a URN id, optionally
/// carrying attached extension schemas.
#[derive(Clone)]
pub struct SchemaDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    slots: Vec<AttrSlot>,
}

const SCHEMA_URN_PREFIX: &str = "urn:ietf:params:scim:schemas:";

impl SchemaDefinition {
    /// Build a bare schema definition with no common attributes. Used for
    /// extension schemas (RFC 7643 §3.3: extensions don't redeclare
    /// `id`/`meta`).
    pub fn new_extension(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> ScimResult<Self> {
        let id = id.into();
        if !id.starts_with(SCHEMA_URN_PREFIX) {
            return Err(ScimError::invalid_syntax(format!(
                "schema id '{id}' must begin with '{SCHEMA_URN_PREFIX}'"
            )));
        }
        let mut seen = HashSet::new();
        for attr in &attributes {
            if !seen.insert(attr.name.to_ascii_lowercase()) {
                return Err(ScimError::invalid_syntax(format!(
                    "duplicate attribute name '{}' in schema '{id}'",
                    attr.name
                )));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            description: description.into(),
            slots: attributes.into_iter().map(AttrSlot::Attribute).collect(),
        })
    }

    /// Build a top-level resource schema: prepends the shadow common
    /// attributes (`schemas`, `id`, `externalId`, `meta`) per RFC 7643 §3.1.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> ScimResult<Self> {
        let mut commons = common_attributes();
        commons.extend(attributes);
        Self::new_extension(id, name, description, commons)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.slots.iter().filter_map(|s| match s {
            AttrSlot::Attribute(a) => Some(a),
            AttrSlot::Extension { .. } => None,
        })
    }

    pub fn extensions(&self) -> impl Iterator<Item = (&Arc<SchemaDefinition>, bool)> {
        self.slots.iter().filter_map(|s| match s {
            AttrSlot::Extension { definition, required } => Some((definition, *required)),
            AttrSlot::Attribute(_) => None,
        })
    }

    /// Human-readable description of every non-shadow attribute, in order.
    pub fn describe(&self) -> Vec<&Attribute> {
        self.attributes().filter(|a| !a.shadow).collect()
    }

    fn find_direct(&self, name: &str) -> Option<&Attribute> {
        self.attributes().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    fn find_extension(&self, id: &str) -> Option<(&Arc<SchemaDefinition>, bool)> {
        self.extensions().find(|(d, _)| d.id.eq_ignore_ascii_case(id))
    }

    /// Resolve an attribute path, possibly URN-qualified into an extension
    /// (RFC 7644 §3.10 attribute notation).
    pub fn attribute(&self, path: &str) -> ScimResult<AttributeRef<'_>> {
        if path.to_ascii_lowercase().starts_with("urn:") {
            let lower_path = path.to_ascii_lowercase();
            let best = self
                .extensions()
                .filter(|(d, _)| lower_path.starts_with(&d.id.to_ascii_lowercase()))
                .max_by_key(|(d, _)| d.id.len());
            let (def, _) = best.ok_or_else(|| {
                ScimError::invalid_path(format!("no extension schema matches '{path}'"))
            })?;
            let remainder = path[def.id.len()..].trim_start_matches([':', '.']);
            if remainder.is_empty() {
                return Ok(AttributeRef::Extension(def));
            }
            return def.attribute(remainder);
        }

        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut attr = self
            .find_direct(first)
            .ok_or_else(|| ScimError::invalid_path(format!("unknown attribute '{first}'")))?;

        for segment in segments {
            if attr.attr_type != AttrType::Complex {
                return Err(ScimError::invalid_path(format!(
                    "'{}' is not complex, cannot access sub-attribute '{segment}'",
                    attr.name
                )));
            }
            attr = attr.find_sub_attribute(segment).ok_or_else(|| {
                ScimError::invalid_path(format!(
                    "'{}' has no sub-attribute '{segment}'",
                    attr.name
                ))
            })?;
        }
        Ok(AttributeRef::Attribute(attr))
    }

    /// Attach an attribute or an extension schema (RFC 7643 §3.3).
    pub fn extend(&mut self, target: ExtendTarget) -> ScimResult<()> {
        match target {
            ExtendTarget::Attribute(attr) => {
                if self.find_direct(&attr.name).is_some() {
                    return Err(ScimError::invalid_syntax(format!(
                        "attribute '{}' already exists on schema '{}'",
                        attr.name, self.id
                    )));
                }
                self.slots.push(AttrSlot::Attribute(attr));
            }
            ExtendTarget::Schema { definition, required } => {
                if self.find_extension(&definition.id).is_some() {
                    return Err(ScimError::invalid_syntax(format!(
                        "extension '{}' already attached to schema '{}'",
                        definition.id, self.id
                    )));
                }
                // Flatten any extensions nested inside the extending
                // definition up to this level.
                let nested: Vec<(Arc<SchemaDefinition>, bool)> = definition
                    .extensions()
                    .map(|(d, r)| (d.clone(), r))
                    .collect();
                self.slots.push(AttrSlot::Extension { definition, required });
                for (nested_def, nested_required) in nested {
                    if self.find_extension(&nested_def.id).is_none() {
                        self.slots.push(AttrSlot::Extension {
                            definition: nested_def,
                            required: nested_required,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove attributes or attached extension schemas in place.
    pub fn truncate(&mut self, targets: Vec<TruncateTarget>) -> ScimResult<()> {
        for target in targets {
            match target {
                TruncateTarget::SchemaId(id) => {
                    let before = self.slots.len();
                    self.slots.retain(|s| match s {
                        AttrSlot::Extension { definition, .. } => !definition.id.eq_ignore_ascii_case(&id),
                        AttrSlot::Attribute(_) => true,
                    });
                    if self.slots.len() == before {
                        return Err(ScimError::invalid_path(format!(
                            "extension schema '{id}' not attached to '{}'",
                            self.id
                        )));
                    }
                }
                TruncateTarget::Name(dotted) => {
                    let mut parts = dotted.splitn(2, '.');
                    let top = parts.next().unwrap_or_default();
                    match parts.next() {
                        None => {
                            let before = self.slots.len();
                            self.slots.retain(|s| match s {
                                AttrSlot::Attribute(a) => !a.name.eq_ignore_ascii_case(top),
                                AttrSlot::Extension { .. } => true,
                            });
                            if self.slots.len() == before {
                                return Err(ScimError::invalid_path(format!(
                                    "attribute '{top}' not found on '{}'",
                                    self.id
                                )));
                            }
                        }
                        Some(sub) => {
                            let slot = self.slots.iter_mut().find(|s| match s {
                                AttrSlot::Attribute(a) => a.name.eq_ignore_ascii_case(top),
                                AttrSlot::Extension { .. } => false,
                            });
                            let AttrSlot::Attribute(attr) = slot.ok_or_else(|| {
                                ScimError::invalid_path(format!("attribute '{top}' not found"))
                            })?
                            else {
                                unreachable!()
                            };
                            let before = attr.sub_attributes.len();
                            attr.sub_attributes
                                .retain(|s| !s.name.eq_ignore_ascii_case(sub));
                            if attr.sub_attributes.len() == before {
                                return Err(ScimError::invalid_path(format!(
                                    "sub-attribute '{sub}' not found on '{top}'"
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Coerce a full document against this schema (RFC 7643 §3).
    pub fn coerce(
        &self,
        data: &Value,
        direction: Direction,
        basepath: Option<&str>,
        existing: Option<&Value>,
        filter: Option<&Filter>,
    ) -> ScimResult<Value> {
        let obj = data
            .as_object()
            .ok_or_else(|| ScimError::invalid_syntax("resource body must be a JSON object"))?;

        let mut out = self.coerce_fields(obj, direction, existing)?;
        self.coerce_extensions(obj, direction, existing, &mut out)?;
        self.populate_schemas(obj, &mut out);
        self.populate_meta(basepath, &mut out);

        let mut result = Value::Object(out);
        if let Some(filter) = filter {
            result = self.apply_projection(&result, filter);
        }
        Ok(result)
    }

    /// Coerce only this definition's own direct attributes (used both for
    /// top-level documents and, without the shadow commons, for extension
    /// bodies nested under an extension's URN key).
    fn coerce_fields(
        &self,
        obj: &Map<String, Value>,
        direction: Direction,
        existing: Option<&Value>,
    ) -> ScimResult<Map<String, Value>> {
        let lower: HashMap<String, &Value> = obj
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let mut out = Map::new();
        for attr in self.attributes() {
            if attr.name.eq_ignore_ascii_case("schemas") {
                continue; // computed separately
            }
            let raw = lower.get(&attr.name.to_ascii_lowercase()).copied();
            let existing_sub = existing.and_then(|e| e.get(&attr.name));
            if let Some(value) = attr.coerce(raw, direction, existing_sub)? {
                out.insert(attr.name.clone(), value);
            }
        }
        Ok(out)
    }

    fn coerce_extensions(
        &self,
        obj: &Map<String, Value>,
        direction: Direction,
        existing: Option<&Value>,
        out: &mut Map<String, Value>,
    ) -> ScimResult<()> {
        for (ext, required) in self.extensions() {
            let mut merged = obj
                .get(&ext.id)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            let prefix = format!("{}:", ext.id);
            for (key, value) in obj {
                if let Some(dotted) = key.strip_prefix(&prefix) {
                    set_dotted(&mut merged, dotted, value.clone());
                }
            }

            if merged.is_empty() {
                if required {
                    return Err(ScimError::invalid_value(format!(
                        "required extension schema missing in schema extension '{}'",
                        ext.id
                    )));
                }
                continue;
            }

            let existing_ext = existing.and_then(|e| e.get(&ext.id));
            let coerced = ext
                .coerce_fields(&merged, direction, existing_ext)
                .map_err(|e| decorate_extension_error(e, &ext.id))?;
            out.insert(ext.id.clone(), Value::Object(coerced));
        }
        Ok(())
    }

    fn populate_schemas(&self, obj: &Map<String, Value>, out: &mut Map<String, Value>) {
        let mut schemas: Vec<String> = vec![self.id.clone()];
        for (ext, _) in self.extensions() {
            if out.contains_key(&ext.id) {
                schemas.push(ext.id.clone());
            }
        }
        if let Some(client_schemas) = obj.get("schemas").and_then(Value::as_array) {
            for s in client_schemas {
                if let Some(s) = s.as_str() {
                    if !schemas.iter().any(|x| x.eq_ignore_ascii_case(s)) {
                        schemas.push(s.to_string());
                    }
                }
            }
        }
        out.insert(
            "schemas".to_string(),
            Value::Array(schemas.into_iter().map(Value::String).collect()),
        );
    }

    fn populate_meta(&self, basepath: Option<&str>, out: &mut Map<String, Value>) {
        if !self.attributes().any(|a| a.name == "meta") {
            return;
        }
        let id = out.get("id").and_then(Value::as_str).map(str::to_string);
        let meta = out
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(meta_obj) = meta {
            meta_obj.insert("resourceType".to_string(), Value::String(self.name.clone()));
            if let (Some(basepath), Some(id)) = (basepath, id) {
                meta_obj.insert(
                    "location".to_string(),
                    Value::String(format!("{basepath}/{id}")),
                );
            }
        }
    }

    /// Apply an `attributes`/`excludedAttributes` projection filter to an
    /// already-coerced document (RFC 7644 §3.9).
    pub fn apply_projection(&self, document: &Value, filter: &Filter) -> Value {
        if filter.is_empty() {
            return document.clone();
        }
        let leaves: Vec<&Leaf> = filter.all_leaves().collect();
        let has_positive = leaves.iter().any(|l| matches!(l, Leaf::Compare { op: crate::filter::CompOp::Pr, .. }));

        let Value::Object(obj) = document else {
            return document.clone();
        };
        let mut out = Map::new();
        for (key, value) in obj {
            if key == "schemas" || key == "id" {
                out.insert(key.clone(), value.clone());
                continue;
            }
            let Some(attr) = self.find_direct(key) else {
                out.insert(key.clone(), value.clone());
                continue;
            };
            if attr.returned == Returned::Always {
                out.insert(key.clone(), value.clone());
                continue;
            }
            if let Some(projected) = self.project_attribute(attr, key, value, &leaves, has_positive) {
                out.insert(key.clone(), projected);
            }
        }
        Value::Object(out)
    }

    fn project_attribute(
        &self,
        attr: &Attribute,
        key: &str,
        value: &Value,
        leaves: &[&Leaf],
        has_positive: bool,
    ) -> Option<Value> {
        let retained = leaf_decision(leaves, key, has_positive);
        if !retained {
            return None;
        }
        if attr.attr_type == AttrType::Complex && !has_value_path_for(leaves, key) {
            // Sub-attribute projection: descend with dotted names.
            return Some(project_complex(attr, key, value, leaves, has_positive));
        }
        Some(value.clone())
    }

    /// Empty document used as the root for building resources from scratch.
    pub fn empty_document() -> Value {
        Value::Object(Map::new())
    }
}

fn project_complex(
    attr: &Attribute,
    key: &str,
    value: &Value,
    leaves: &[&Leaf],
    has_positive: bool,
) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project_complex_object(attr, key, item, leaves, has_positive))
                .collect(),
        ),
        obj => project_complex_object(attr, key, obj, leaves, has_positive),
    }
}

fn project_complex_object(
    attr: &Attribute,
    key: &str,
    value: &Value,
    leaves: &[&Leaf],
    has_positive: bool,
) -> Value {
    let Value::Object(obj) = value else {
        return value.clone();
    };
    let mut out = Map::new();
    for (sub_key, sub_value) in obj {
        let dotted = format!("{key}.{sub_key}");
        let sub_attr = attr.find_sub_attribute(sub_key);
        if let Some(sub_attr) = sub_attr {
            if sub_attr.returned == Returned::Always {
                out.insert(sub_key.clone(), sub_value.clone());
                continue;
            }
        }
        if leaf_decision(leaves, &dotted, has_positive) || leaf_decision(leaves, key, has_positive) {
            out.insert(sub_key.clone(), sub_value.clone());
        }
    }
    Value::Object(out)
}

fn has_value_path_for(leaves: &[&Leaf], key: &str) -> bool {
    leaves
        .iter()
        .any(|l| matches!(l, Leaf::ValuePath { path, .. } if path.eq_ignore_ascii_case(key)))
}

/// Positive (`pr`) leaves win over negative (`np`) ones for the same path;
/// if any positive leaf exists anywhere, only explicitly-matched attributes
/// survive. Otherwise everything survives except explicitly-excluded
/// attributes (RFC 7644 §3.9).
fn leaf_decision(leaves: &[&Leaf], key: &str, has_positive: bool) -> bool {
    use crate::filter::CompOp;
    let matches_leaf = |want_op: CompOp| {
        leaves.iter().any(|l| match l {
            Leaf::Compare { path, op, .. } if *op == want_op => {
                path.eq_ignore_ascii_case(key) || key.to_ascii_lowercase().starts_with(&format!("{}.", path.to_ascii_lowercase()))
            }
            _ => false,
        })
    };
    let positive = matches_leaf(CompOp::Pr);
    let negative = matches_leaf(CompOp::Np);
    if positive {
        return true;
    }
    if !has_positive {
        return !negative;
    }
    false
}

fn set_dotted(map: &mut Map<String, Value>, dotted: &str, value: Value) {
    let mut parts = dotted.splitn(2, '.');
    let head = parts.next().unwrap_or_default();
    match parts.next() {
        None => {
            map.insert(head.to_string(), value);
        }
        Some(rest) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(nested) = entry {
                set_dotted(nested, rest, value);
            }
        }
    }
}

fn decorate_extension_error(err: ScimError, ext_id: &str) -> ScimError {
    let suffix = format!(" in schema extension '{ext_id}'");
    match err {
        ScimError::InvalidSyntax(m) => ScimError::InvalidSyntax(m + &suffix),
        ScimError::InvalidValue(m) => ScimError::InvalidValue(m + &suffix),
        ScimError::Mutability(m) => ScimError::Mutability(m + &suffix),
        ScimError::InvalidPath(m) => ScimError::InvalidPath(m + &suffix),
        other => other,
    }
}

/// The shadow common attributes every top-level resource schema prepends
/// (RFC 7643 §3.1).
fn common_attributes() -> Vec<Attribute> {
    vec![
        Attribute::primitive("schemas", AttrType::Reference)
            .multi_valued(true)
            .required(true)
            .shadow(true),
        Attribute::primitive("id", AttrType::String)
            .returned(Returned::Always)
            .mutability(Mutability::ReadOnly)
            .uniqueness(Uniqueness::Global)
            .case_exact(true)
            .shadow(true),
        Attribute::primitive("externalId", AttrType::String)
            .direction(Direction::In)
            .case_exact(true)
            .shadow(true),
        Attribute::complex(
            "meta",
            vec![
                Attribute::primitive("resourceType", AttrType::String).mutability(Mutability::ReadOnly),
                Attribute::primitive("created", AttrType::DateTime).mutability(Mutability::ReadOnly),
                Attribute::primitive("lastModified", AttrType::DateTime).mutability(Mutability::ReadOnly),
                Attribute::primitive("location", AttrType::String).mutability(Mutability::ReadOnly),
                Attribute::primitive("version", AttrType::String).mutability(Mutability::ReadOnly),
            ],
        )
        .mutability(Mutability::ReadOnly)
        .shadow(true),
    ]
}

/// Result of [`SchemaDefinition::attribute`].
pub enum AttributeRef<'a> {
    Attribute(&'a Attribute),
    Extension(&'a SchemaDefinition),
}

/// Target for [`SchemaDefinition::extend`].
pub enum ExtendTarget {
    Attribute(Attribute),
    Schema {
        definition: Arc<SchemaDefinition>,
        required: bool,
    },
}

/// Target for [`SchemaDefinition::truncate`].
pub enum TruncateTarget {
    Name(String),
    SchemaId(String),
}

impl AttributeCaseResolver for SchemaDefinition {
    fn case_exact(&self, path: &str) -> Option<bool> {
        self.attribute(path).ok().and_then(|r| match r {
            AttributeRef::Attribute(a) => Some(a.case_exact),
            AttributeRef::Extension(_) => None,
        })
    }
}
