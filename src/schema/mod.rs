//! Schema definition and coercion engine (RFC 7643 §2, §3).
//!
//! [`attribute`] defines the per-value coercion rules; [`definition`]
//! assembles attributes (and attached extension schemas) into a
//! [`SchemaDefinition`] with document-level coercion, lookup and
//! projection; [`builtin`] ships the core User/Group schemas and the
//! EnterpriseUser extension as ready-made instances.

pub mod attribute;
pub mod builtin;
pub mod definition;

pub use attribute::{AttrType, Attribute, Direction, Mutability, ReferenceType, Returned, Uniqueness};
pub use definition::{AttributeRef, ExtendTarget, SchemaDefinition, TruncateTarget};
