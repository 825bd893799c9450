//! Error taxonomy for SCIM server operations.
//!
//! Every error the core can raise maps to one of the kinds in RFC 7644 §3.12:
//! a SCIM `scimType` keyword plus an HTTP status code. [`ScimError`] carries
//! that mapping so callers never have to re-derive it, and [`ErrorResponse`]
//! is its wire projection (the envelope described in RFC 7644 §3.12).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `scimType` keywords defined by RFC 7644 §3.12, Table 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimType {
    Uniqueness,
    TooMany,
    InvalidFilter,
    Mutability,
    InvalidSyntax,
    InvalidPath,
    NoTarget,
    InvalidValue,
    InvalidVers,
    Sensitive,
}

impl fmt::Display for ScimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScimType::Uniqueness => "uniqueness",
            ScimType::TooMany => "tooMany",
            ScimType::InvalidFilter => "invalidFilter",
            ScimType::Mutability => "mutability",
            ScimType::InvalidSyntax => "invalidSyntax",
            ScimType::InvalidPath => "invalidPath",
            ScimType::NoTarget => "noTarget",
            ScimType::InvalidValue => "invalidValue",
            ScimType::InvalidVers => "invalidVers",
            ScimType::Sensitive => "sensitive",
        };
        f.write_str(s)
    }
}

/// Main error type returned by every core operation.
///
/// Each variant names the RFC 7644 §3.12 error kind it represents. The
/// `scim_type()` and `http_status()` accessors give the binding to the wire
/// format; hosts that speak HTTP can pass `http_status()` straight to their
/// response builder.
#[derive(Debug, thiserror::Error)]
pub enum ScimError {
    /// Bad envelope, wrong schema id, missing required structural field.
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    /// Well-formed request, semantically invalid value.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Unparseable filter expression.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Well-formed filter, but an attribute path that does not resolve.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// PatchOp targeted a member that does not exist.
    #[error("no target: {0}")]
    NoTarget(String),

    /// Write to a read-only or immutable attribute, or a value that
    /// disagrees with an existing immutable value.
    #[error("mutability: {0}")]
    Mutability(String),

    /// Uniqueness constraint violated.
    #[error("uniqueness: {0}")]
    Uniqueness(String),

    /// List or bulk request exceeded a configured limit.
    #[error("too many: {0}")]
    TooMany(String),

    /// ETag precondition failed, or a bulk dependency could not be resolved.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Host handler not wired up for this resource type / operation.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Host handler raised something unexpected.
    #[error("internal error: {0}")]
    Internal(String),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScimError {
    pub fn invalid_syntax(msg: impl Into<String>) -> Self {
        Self::InvalidSyntax(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    pub fn no_target(msg: impl Into<String>) -> Self {
        Self::NoTarget(msg.into())
    }

    pub fn mutability(msg: impl Into<String>) -> Self {
        Self::Mutability(msg.into())
    }

    pub fn uniqueness(msg: impl Into<String>) -> Self {
        Self::Uniqueness(msg.into())
    }

    pub fn too_many(msg: impl Into<String>) -> Self {
        Self::TooMany(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound(format!("{} with id {}", resource_type.into(), id.into()))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// The `scimType` keyword for this error, or `None` for kinds that carry
    /// a null `scimType` per RFC 7644 §3.12 (not-found, precondition,
    /// internal, not-implemented).
    pub fn scim_type(&self) -> Option<ScimType> {
        match self {
            ScimError::InvalidSyntax(_) => Some(ScimType::InvalidSyntax),
            ScimError::InvalidValue(_) => Some(ScimType::InvalidValue),
            ScimError::InvalidFilter(_) => Some(ScimType::InvalidFilter),
            ScimError::InvalidPath(_) => Some(ScimType::InvalidPath),
            ScimError::NoTarget(_) => Some(ScimType::NoTarget),
            ScimError::Mutability(_) => Some(ScimType::Mutability),
            ScimError::Uniqueness(_) => Some(ScimType::Uniqueness),
            ScimError::TooMany(_) => Some(ScimType::TooMany),
            ScimError::Json(_) => Some(ScimType::InvalidSyntax),
            ScimError::Precondition(_)
            | ScimError::NotFound(_)
            | ScimError::Internal(_)
            | ScimError::NotImplemented(_) => None,
        }
    }

    /// HTTP status code this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            ScimError::InvalidSyntax(_)
            | ScimError::InvalidValue(_)
            | ScimError::InvalidFilter(_)
            | ScimError::InvalidPath(_)
            | ScimError::NoTarget(_)
            | ScimError::Mutability(_)
            | ScimError::Json(_) => 400,
            ScimError::Uniqueness(_) => 409,
            ScimError::TooMany(_) => 413,
            ScimError::Precondition(_) => 412,
            ScimError::NotFound(_) => 404,
            ScimError::Internal(_) => 500,
            ScimError::NotImplemented(_) => 501,
        }
    }

    /// Project this error into the wire `ErrorResponse` envelope.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.http_status(), self.scim_type(), self.to_string())
    }
}

pub type ScimResult<T> = Result<T, ScimError>;

/// The SCIM error response envelope (RFC 7644 §3.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub schemas: Vec<String>,
    pub status: String,
    #[serde(rename = "scimType", skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

impl ErrorResponse {
    pub fn new(status: u16, scim_type: Option<ScimType>, detail: impl Into<String>) -> Self {
        Self {
            schemas: vec![ERROR_SCHEMA.to_string()],
            status: status.to_string(),
            scim_type,
            detail: Some(detail.into()),
        }
    }

    /// Re-hydrate an inbound `ErrorResponse` (e.g. from a bulk sub-response)
    /// back into a [`ScimError`] so it can be propagated through the core
    /// like any other failure (spec.md §7 "Propagation").
    pub fn into_scim_error(self) -> ScimError {
        let detail = self.detail.unwrap_or_default();
        match self.scim_type {
            Some(ScimType::Uniqueness) => ScimError::Uniqueness(detail),
            Some(ScimType::TooMany) => ScimError::TooMany(detail),
            Some(ScimType::InvalidFilter) => ScimError::InvalidFilter(detail),
            Some(ScimType::Mutability) => ScimError::Mutability(detail),
            Some(ScimType::InvalidSyntax) => ScimError::InvalidSyntax(detail),
            Some(ScimType::InvalidPath) => ScimError::InvalidPath(detail),
            Some(ScimType::NoTarget) => ScimError::NoTarget(detail),
            Some(ScimType::InvalidValue) => ScimError::InvalidValue(detail),
            Some(ScimType::InvalidVers) | Some(ScimType::Sensitive) => {
                ScimError::InvalidValue(detail)
            }
            None => match self.status.as_str() {
                "404" => ScimError::Internal(format!("not found: {detail}")),
                "412" => ScimError::Precondition(detail),
                "501" => ScimError::NotImplemented(detail),
                _ => ScimError::Internal(detail),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_maps_to_400() {
        let err = ScimError::invalid_value("userName is required");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.scim_type(), Some(ScimType::InvalidValue));
    }

    #[test]
    fn uniqueness_maps_to_409() {
        let err = ScimError::uniqueness("userName already exists");
        assert_eq!(err.http_status(), 409);
        assert_eq!(err.scim_type(), Some(ScimType::Uniqueness));
    }

    #[test]
    fn not_found_has_no_scim_type() {
        let err = ScimError::not_found("User", "123");
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.scim_type(), None);
    }

    #[test]
    fn error_response_round_trips_through_scim_error() {
        let original = ScimError::no_target("emails[type eq \"work\"] matched nothing");
        let response = original.to_error_response();
        let json = serde_json::to_string(&response).unwrap();
        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();
        let reconstructed = parsed.into_scim_error();
        assert_eq!(reconstructed.http_status(), 400);
        assert_eq!(reconstructed.scim_type(), Some(ScimType::NoTarget));
    }
}
