//! A transport-agnostic SCIM 2.0 server library (RFC 7643 core schema, RFC
//! 7644 protocol).
//!
//! Four subsystems do the hard work: [`schema`] (attribute model and
//! document coercion), [`filter`] (the SCIM filter language), [`patch`]
//! (PatchOp interpretation) and [`bulk`] (the BulkRequest scheduler). The
//! [`resource`] module binds them to host-supplied storage handlers;
//! [`registry`] and [`service_provider_config`] hold the process-wide,
//! read-only configuration a host wires up at startup.
//!
//! This crate never speaks HTTP, authenticates callers, or persists
//! anything itself — a host supplies [`resource::ResourceProvider`]
//! implementations and binds routes to [`resource::Resource`] calls.

pub mod bulk;
pub mod error;
pub mod filter;
pub mod patch;
pub mod providers;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod service_provider_config;

pub use error::{ErrorResponse, ScimError, ScimResult, ScimType};
pub use filter::Filter;
pub use registry::{ResourceType, ResourceTypeRegistry, SchemaRegistry};
pub use resource::{Resource, ResourceParams, ResourceProvider};
pub use schema::{Attribute, SchemaDefinition};
pub use service_provider_config::ServiceProviderConfig;
