//! ETag-style optimistic concurrency for resource writes (the flag this
//! gates is `etag.supported` in the service provider config, RFC 7643 §5).

use std::fmt;

/// An opaque resource version, rendered as a weak ETag on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawVersion(String);

impl RawVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_etag(&self) -> String {
        format!("W/\"{}\"", self.0)
    }

    pub fn parse_etag(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches("W/").trim_matches('"');
        Self(trimmed.to_string())
    }
}

impl fmt::Display for RawVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a version-guarded write.
pub enum ConditionalResult<T> {
    Applied(T),
    PreconditionFailed,
}

impl<T> ConditionalResult<T> {
    pub fn into_result(self, resource_type: &str, id: &str) -> crate::error::ScimResult<T> {
        match self {
            ConditionalResult::Applied(value) => Ok(value),
            ConditionalResult::PreconditionFailed => Err(crate::error::ScimError::precondition(format!(
                "version precondition failed for {resource_type} '{id}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_round_trips() {
        let version = RawVersion::new("abc123");
        let etag = version.to_etag();
        assert_eq!(etag, "W/\"abc123\"");
        assert_eq!(RawVersion::parse_etag(&etag), version);
    }
}
