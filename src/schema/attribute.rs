//! Attribute model and per-value coercion (RFC 7643 §2.2, §2.3).
//!
//! An [`Attribute`] describes a single named field of a schema: its
//! primitive type, multi-valuedness, sub-attributes (for complex types) and
//! the RFC 7643 characteristics that govern how values move in and out of a
//! resource. [`Attribute::coerce`] is the only place values are validated
//! and normalised against those characteristics.

use crate::error::{ScimError, ScimResult};
use base64::Engine;
use serde_json::{Map, Value};

/// RFC 7643 §2.2 attribute data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Boolean,
    Decimal,
    Integer,
    DateTime,
    Binary,
    Reference,
    Complex,
}

/// RFC 7643 §2.2 mutability characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    ReadWrite,
    ReadOnly,
    Immutable,
    WriteOnly,
}

/// RFC 7643 §2.2 "returned" characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returned {
    Always,
    Never,
    Default,
    Request,
}

/// RFC 7643 §2.2 uniqueness characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    None,
    Server,
    Global,
}

/// Which coercion direction(s) an attribute participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

/// `referenceTypes` values (RFC 7643 §7, Table 7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceType {
    External,
    Uri,
    Resource(String),
}

/// A single named field of a [`crate::schema::SchemaDefinition`].
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttrType,
    pub multi_valued: bool,
    pub required: bool,
    pub case_exact: bool,
    pub mutability: Mutability,
    pub returned: Returned,
    pub uniqueness: Uniqueness,
    pub canonical_values: Vec<String>,
    pub reference_types: Vec<ReferenceType>,
    pub sub_attributes: Vec<Attribute>,
    /// Excluded from `describe()` output (used for server-managed commons
    /// like `id`/`meta` that are prepended by `SchemaDefinition::new`).
    pub shadow: bool,
    pub direction: Direction,
    pub description: String,
}

impl Attribute {
    fn new_unchecked(name: String, attr_type: AttrType) -> Self {
        Self {
            name,
            attr_type,
            multi_valued: false,
            required: false,
            case_exact: false,
            mutability: Mutability::ReadWrite,
            returned: Returned::Default,
            uniqueness: Uniqueness::None,
            canonical_values: Vec::new(),
            reference_types: Vec::new(),
            sub_attributes: Vec::new(),
            shadow: false,
            direction: Direction::Both,
            description: String::new(),
        }
    }

    /// A primitive (non-complex) attribute.
    pub fn primitive(name: impl Into<String>, attr_type: AttrType) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "attribute name must not be empty");
        assert!(!name.contains('.'), "attribute name must not contain '.'");
        assert_ne!(
            attr_type,
            AttrType::Complex,
            "use Attribute::complex for complex attributes"
        );
        Self::new_unchecked(name, attr_type)
    }

    /// A complex attribute with the given sub-attributes. If `multi_valued`
    /// is later set to `true`, an implicit boolean `primary` sub-attribute
    /// is enforced at coercion time even if not listed here (RFC 7643 §2.4).
    pub fn complex(name: impl Into<String>, sub_attributes: Vec<Attribute>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "attribute name must not be empty");
        assert!(!name.contains('.'), "attribute name must not contain '.'");
        let mut attr = Self::new_unchecked(name, AttrType::Complex);
        attr.sub_attributes = sub_attributes;
        attr
    }

    pub fn multi_valued(mut self, value: bool) -> Self {
        self.multi_valued = value;
        self
    }

    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    pub fn case_exact(mut self, value: bool) -> Self {
        self.case_exact = value;
        self
    }

    pub fn mutability(mut self, value: Mutability) -> Self {
        self.mutability = value;
        self
    }

    pub fn returned(mut self, value: Returned) -> Self {
        self.returned = value;
        self
    }

    pub fn uniqueness(mut self, value: Uniqueness) -> Self {
        self.uniqueness = value;
        self
    }

    pub fn canonical_values(mut self, values: Vec<impl Into<String>>) -> Self {
        self.canonical_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn reference_types(mut self, values: Vec<ReferenceType>) -> Self {
        self.reference_types = values;
        self
    }

    pub fn direction(mut self, value: Direction) -> Self {
        self.direction = value;
        self
    }

    pub fn shadow(mut self, value: bool) -> Self {
        self.shadow = value;
        self
    }

    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.description = value.into();
        self
    }

    pub fn find_sub_attribute(&self, name: &str) -> Option<&Attribute> {
        self.sub_attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    fn canonical_allows(&self, s: &str) -> bool {
        if self.canonical_values.is_empty() {
            return true;
        }
        self.canonical_values.iter().any(|c| {
            if self.case_exact {
                c == s
            } else {
                c.eq_ignore_ascii_case(s)
            }
        })
    }

    /// Coerce a raw JSON value against this attribute's characteristics.
    ///
    /// `existing` is the attribute's current value on the live resource (for
    /// `immutable` checks); pass `None` on create. Returns `Ok(None)` when
    /// the attribute is legitimately omitted from the output (direction
    /// mismatch, absent optional value, or a dropped read-only/never
    /// attribute) rather than an error.
    pub fn coerce(
        &self,
        value: Option<&Value>,
        direction: Direction,
        existing: Option<&Value>,
    ) -> ScimResult<Option<Value>> {
        if direction != Direction::Both
            && self.direction != Direction::Both
            && self.direction != direction
        {
            return Ok(None);
        }

        let is_empty = matches!(value, None | Some(Value::Null))
            || matches!(value, Some(Value::Array(a)) if a.is_empty())
            || matches!(value, Some(Value::String(s)) if s.is_empty());

        if direction == Direction::In && self.mutability == Mutability::ReadOnly {
            // Inbound writes to read-only attributes are silently dropped;
            // server-computed value (if any) survives via `existing`.
            return Ok(existing.cloned());
        }

        if self.required && is_empty {
            return Err(ScimError::invalid_value(format!(
                "'{}' is required",
                self.name
            )));
        }

        if is_empty {
            return Ok(None);
        }
        let value = value.unwrap();

        if direction == Direction::Out && self.returned == Returned::Never {
            return Ok(None);
        }

        if self.multi_valued {
            return self.coerce_multi_valued(value, direction, existing);
        }

        if value.is_array() {
            return Err(ScimError::invalid_syntax(format!(
                "'{}' must not be multi-valued",
                self.name
            )));
        }

        let coerced = self.coerce_scalar(value)?;

        if direction == Direction::In && self.mutability == Mutability::Immutable {
            if let Some(existing) = existing {
                if !self.values_equal(existing, &coerced) {
                    return Err(ScimError::mutability(format!(
                        "'{}' is immutable and cannot be changed",
                        self.name
                    )));
                }
            }
        }

        Ok(Some(coerced))
    }

    fn coerce_multi_valued(
        &self,
        value: &Value,
        direction: Direction,
        existing: Option<&Value>,
    ) -> ScimResult<Option<Value>> {
        let array = value.as_array().ok_or_else(|| {
            ScimError::invalid_syntax(format!("'{}' must be multi-valued (array)", self.name))
        })?;

        let existing_array = existing.and_then(Value::as_array);
        let mut out = Vec::with_capacity(array.len());
        let mut primary_seen = false;

        for (idx, item) in array.iter().enumerate() {
            let existing_item = existing_array.and_then(|a| a.get(idx));
            let coerced_item = if self.attr_type == AttrType::Complex {
                self.coerce_complex(item, direction, existing_item)?
            } else {
                self.coerce_scalar(item)?
            };

            if self.attr_type == AttrType::Complex {
                if let Some(true) = coerced_item.get("primary").and_then(Value::as_bool) {
                    if primary_seen {
                        return Err(ScimError::invalid_value(format!(
                            "'{}' may have at most one element with primary=true",
                            self.name
                        )));
                    }
                    primary_seen = true;
                }
            }

            out.push(coerced_item);
        }

        if self.uniqueness != Uniqueness::None {
            for i in 0..out.len() {
                for j in (i + 1)..out.len() {
                    if out[i] == out[j] {
                        return Err(ScimError::uniqueness(format!(
                            "'{}' values must be unique",
                            self.name
                        )));
                    }
                }
            }
        }

        Ok(Some(Value::Array(out)))
    }

    fn coerce_complex(
        &self,
        value: &Value,
        direction: Direction,
        existing: Option<&Value>,
    ) -> ScimResult<Value> {
        let obj = value.as_object().ok_or_else(|| {
            ScimError::invalid_syntax(format!("'{}' must be a JSON object", self.name))
        })?;
        self.coerce_complex_object(obj, direction, existing)
    }

    fn coerce_complex_object(
        &self,
        obj: &Map<String, Value>,
        direction: Direction,
        existing: Option<&Value>,
    ) -> ScimResult<Value> {
        let lower: std::collections::HashMap<String, &Value> = obj
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        let mut known: std::collections::HashSet<String> =
            self.sub_attributes.iter().map(|a| a.name.to_ascii_lowercase()).collect();
        // `primary` is implicit on multi-valued complex attributes.
        if self.multi_valued {
            known.insert("primary".to_string());
        }
        for key in lower.keys() {
            if !known.contains(key) {
                return Err(ScimError::invalid_syntax(format!(
                    "unknown sub-attribute '{}' of '{}'",
                    key, self.name
                )));
            }
        }

        let mut out = Map::new();
        let mut sub_attrs = self.sub_attributes.clone();
        if self.multi_valued && self.find_sub_attribute("primary").is_none() {
            sub_attrs.push(
                Attribute::primitive("primary", AttrType::Boolean)
                    .mutability(Mutability::ReadWrite),
            );
        }

        for sub in &sub_attrs {
            let raw = lower.get(&sub.name.to_ascii_lowercase()).copied();
            let existing_sub = existing.and_then(|e| e.get(&sub.name));
            if let Some(coerced) = sub.coerce(raw, direction, existing_sub)? {
                out.insert(sub.name.clone(), coerced);
            }
        }
        Ok(Value::Object(out))
    }

    fn coerce_scalar(&self, value: &Value) -> ScimResult<Value> {
        if self.attr_type == AttrType::Complex {
            return self.coerce_complex(value, Direction::Both, None);
        }

        match self.attr_type {
            AttrType::String | AttrType::Reference => {
                let s = value.as_str().ok_or_else(|| {
                    ScimError::invalid_syntax(format!("'{}' must be a string", self.name))
                })?;
                if !self.canonical_allows(s) {
                    return Err(ScimError::invalid_value(format!(
                        "'{}' has value '{}' not in canonicalValues {:?}",
                        self.name, s, self.canonical_values
                    )));
                }
                if self.attr_type == AttrType::Reference {
                    self.validate_reference(s)?;
                }
                Ok(Value::String(s.to_string()))
            }
            AttrType::Boolean => {
                value
                    .as_bool()
                    .map(Value::Bool)
                    .ok_or_else(|| ScimError::invalid_syntax(format!("'{}' must be a boolean", self.name)))
            }
            AttrType::Integer => {
                let n = value.as_f64().ok_or_else(|| {
                    ScimError::invalid_syntax(format!("'{}' must be numeric", self.name))
                })?;
                if !n.is_finite() || n.fract() != 0.0 {
                    return Err(ScimError::invalid_value(format!(
                        "'{}' must be a whole number",
                        self.name
                    )));
                }
                Ok(value.clone())
            }
            AttrType::Decimal => {
                let n = value.as_f64().ok_or_else(|| {
                    ScimError::invalid_syntax(format!("'{}' must be numeric", self.name))
                })?;
                if !n.is_finite() {
                    return Err(ScimError::invalid_value(format!(
                        "'{}' must be a finite number",
                        self.name
                    )));
                }
                Ok(value.clone())
            }
            AttrType::DateTime => {
                let s = value.as_str().ok_or_else(|| {
                    ScimError::invalid_syntax(format!("'{}' must be a string", self.name))
                })?;
                chrono::DateTime::parse_from_rfc3339(s).map_err(|_| {
                    ScimError::invalid_value(format!(
                        "'{}' is not a valid RFC 3339 dateTime: '{}'",
                        self.name, s
                    ))
                })?;
                Ok(Value::String(s.to_string()))
            }
            AttrType::Binary => {
                let s = value.as_str().ok_or_else(|| {
                    ScimError::invalid_syntax(format!("'{}' must be a base64 string", self.name))
                })?;
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(|_| {
                        ScimError::invalid_value(format!("'{}' is not valid base64", self.name))
                    })?;
                Ok(Value::String(s.to_string()))
            }
            AttrType::Complex => unreachable!(),
        }
    }

    fn validate_reference(&self, s: &str) -> ScimResult<()> {
        let needs_uri_syntax = self.reference_types.iter().any(|rt| {
            matches!(rt, ReferenceType::External | ReferenceType::Uri)
        }) || self.reference_types.is_empty();
        if !needs_uri_syntax {
            return Ok(());
        }
        if is_syntactically_valid_uri(s) {
            Ok(())
        } else {
            Err(ScimError::invalid_value(format!(
                "'{}' is not a syntactically valid reference URI: '{}'",
                self.name, s
            )))
        }
    }

    /// Equality used for immutable-attribute comparison and canonical
    /// case-insensitivity (RFC 7643 §2.2: case-exact strings compare
    /// exactly, otherwise case-insensitively; stored casing is always
    /// preserved).
    fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::String(x), Value::String(y)) => {
                if self.case_exact {
                    x == y
                } else {
                    x.eq_ignore_ascii_case(y)
                }
            }
            _ => a == b,
        }
    }
}

/// A minimal syntactic check for absolute-URI shape: `scheme:rest`, where
/// `scheme` starts with a letter and contains only `[A-Za-z0-9+.-]`.
pub(crate) fn is_syntactically_valid_uri(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    let (scheme, rest) = s.split_at(colon);
    if scheme.is_empty() || rest.len() < 2 {
        return false;
    }
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn username_attr() -> Attribute {
        Attribute::primitive("userName", AttrType::String).required(true)
    }

    #[test]
    fn required_missing_fails() {
        let attr = username_attr();
        let err = attr.coerce(None, Direction::In, None).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn string_round_trips() {
        let attr = username_attr();
        let out = attr
            .coerce(Some(&json!("bjensen")), Direction::In, None)
            .unwrap();
        assert_eq!(out, Some(json!("bjensen")));
    }

    #[test]
    fn canonical_values_case_insensitive_by_default() {
        let attr = Attribute::primitive("type", AttrType::String).canonical_values(vec!["work", "home"]);
        let out = attr.coerce(Some(&json!("WORK")), Direction::In, None).unwrap();
        assert_eq!(out, Some(json!("WORK")));
        let err = attr.coerce(Some(&json!("other")), Direction::In, None);
        assert!(err.is_err());
    }

    #[test]
    fn read_only_dropped_inbound() {
        let attr = Attribute::primitive("id", AttrType::String).mutability(Mutability::ReadOnly);
        let out = attr
            .coerce(Some(&json!("client-supplied")), Direction::In, Some(&json!("server-id")))
            .unwrap();
        assert_eq!(out, Some(json!("server-id")));
    }

    #[test]
    fn immutable_rejects_change() {
        let attr = Attribute::primitive("userName", AttrType::String).mutability(Mutability::Immutable);
        let err = attr
            .coerce(Some(&json!("new")), Direction::In, Some(&json!("old")))
            .unwrap_err();
        assert_eq!(err.scim_type(), Some(crate::error::ScimType::Mutability));
    }

    #[test]
    fn immutable_allows_same_value() {
        let attr = Attribute::primitive("userName", AttrType::String).mutability(Mutability::Immutable);
        let out = attr
            .coerce(Some(&json!("same")), Direction::In, Some(&json!("same")))
            .unwrap();
        assert_eq!(out, Some(json!("same")));
    }

    #[test]
    fn never_returned_dropped_outbound() {
        let attr = Attribute::primitive("password", AttrType::String).returned(Returned::Never);
        let out = attr
            .coerce(Some(&json!("secret")), Direction::Out, None)
            .unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn multi_valued_rejects_second_primary() {
        let attr = Attribute::complex(
            "emails",
            vec![Attribute::primitive("value", AttrType::String)],
        )
        .multi_valued(true);
        let value = json!([
            {"value": "a@x.com", "primary": true},
            {"value": "b@x.com", "primary": true}
        ]);
        let err = attr.coerce(Some(&value), Direction::In, None).unwrap_err();
        assert_eq!(err.scim_type(), Some(crate::error::ScimType::InvalidValue));
    }

    #[test]
    fn complex_rejects_unknown_sub_attribute() {
        let attr = Attribute::complex(
            "name",
            vec![Attribute::primitive("givenName", AttrType::String)],
        );
        let err = attr
            .coerce(Some(&json!({"givenName": "Bob", "nickName": "B"})), Direction::In, None)
            .unwrap_err();
        assert_eq!(err.scim_type(), Some(crate::error::ScimType::InvalidSyntax));
    }

    #[test]
    fn integer_rejects_fractional() {
        let attr = Attribute::primitive("count", AttrType::Integer);
        let err = attr.coerce(Some(&json!(1.5)), Direction::In, None).unwrap_err();
        assert_eq!(err.scim_type(), Some(crate::error::ScimType::InvalidValue));
    }

    #[test]
    fn date_time_requires_rfc3339() {
        let attr = Attribute::primitive("created", AttrType::DateTime);
        assert!(attr.coerce(Some(&json!("not-a-date")), Direction::In, None).is_err());
        assert!(
            attr.coerce(Some(&json!("2010-01-23T04:56:22Z")), Direction::In, None)
                .is_ok()
        );
    }

    #[test]
    fn direction_mismatch_is_omitted_not_error() {
        let attr = Attribute::primitive("externalId", AttrType::String).direction(Direction::In);
        let out = attr
            .coerce(Some(&json!("ext-1")), Direction::Out, None)
            .unwrap();
        assert_eq!(out, None);
    }
}
