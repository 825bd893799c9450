//! Resource façade, list responses, provider seam, and version handling
//! (RFC 7644 §3.3-§3.6).

pub mod facade;
pub mod list_response;
pub mod provider;
pub mod version;

pub use facade::{Resource, ResourceParams};
pub use list_response::{ListParams, ListResponse, SortOrder};
pub use provider::{EgressResult, RequestContext, ResourceProvider};
pub use version::{ConditionalResult, RawVersion};
