//! Host-supplied persistence handlers (spec glossary: degress/egress/ingress).
//!
//! The core never touches storage directly. A [`ResourceProvider`] is the
//! seam a host implements once per backend; [`crate::providers::InMemoryProvider`]
//! is the reference implementation used by this crate's own tests.

use crate::error::ScimResult;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// What an egress read call returns: a single resource (by id) or an
/// already-filtered, not-yet-sorted collection (list/search).
pub enum EgressResult {
    Single(Option<Value>),
    Many(Vec<Value>),
}

/// Read-side query parameters forwarded to `egress` for list reads (spec
/// §4.7: the Resource façade compiles these before calling out).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub resource_type: String,
    pub id: Option<String>,
    pub filter: Option<crate::filter::Filter>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = ScimResult<T>> + Send + 'a>>;

/// Host-supplied create/read/update/delete handlers for one resource type.
pub trait ResourceProvider: Send + Sync {
    fn egress<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, EgressResult>;

    /// Create (when `id` is `None`) or update (`id` is `Some`) a resource.
    /// `existing` is the current coerced document, supplied by the caller
    /// so ingress can enforce its own invariants without a second read.
    fn ingress<'a>(&'a self, ctx: &'a RequestContext, data: Value, existing: Option<Value>) -> BoxFuture<'a, Value>;

    fn degress<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, ()>;
}
