//! Immutable projection of service-provider feature flags (RFC 7643 §5).

use serde::{Deserialize, Serialize};

pub const SERVICE_PROVIDER_CONFIG_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedFlag {
    pub supported: bool,
}

impl Default for SupportedFlag {
    fn default() -> Self {
        Self { supported: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkConfig {
    pub supported: bool,
    pub max_operations: u32,
    pub max_payload_size: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { supported: false, max_operations: 1000, max_payload_size: 1_048_576 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub supported: bool,
    pub max_results: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { supported: false, max_results: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationScheme {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_uri: Option<String>,
}

/// Flat container of provider feature flags, exposed to consumers only as
/// deep-copied snapshots; the setter is the sole mutation path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_uri: Option<String>,
    pub patch: SupportedFlag,
    pub bulk: BulkConfig,
    pub filter: FilterConfig,
    pub change_password: SupportedFlag,
    pub sort: SupportedFlag,
    pub etag: SupportedFlag,
    pub authentication_schemes: Vec<AuthenticationScheme>,
}

/// A setter value in the shorthand forms described by RFC 7643 §5.
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    Schemes(Vec<AuthenticationScheme>),
    DocumentationUri(String),
}

impl ServiceProviderConfig {
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Apply a single `(name, value)` shorthand update (RFC 7643 §5).
    pub fn set(&mut self, name: &str, value: ConfigValue) -> crate::error::ScimResult<()> {
        use crate::error::ScimError;
        match (name, value) {
            ("patch", ConfigValue::Bool(b)) => self.patch.supported = b,
            ("changePassword", ConfigValue::Bool(b)) => self.change_password.supported = b,
            ("sort", ConfigValue::Bool(b)) => self.sort.supported = b,
            ("etag", ConfigValue::Bool(b)) => self.etag.supported = b,
            ("bulk", ConfigValue::Bool(b)) => self.bulk.supported = b,
            ("filter", ConfigValue::Bool(b)) => self.filter.supported = b,
            ("bulk", ConfigValue::Number(n)) => {
                self.bulk.max_operations = n as u32;
                self.bulk.supported = n > 0.0;
            }
            ("filter", ConfigValue::Number(n)) => {
                self.filter.max_results = n as u32;
            }
            ("authenticationSchemes", ConfigValue::Schemes(schemes)) => {
                if schemes.is_empty() {
                    self.authentication_schemes.clear();
                } else {
                    self.authentication_schemes.extend(schemes);
                }
            }
            ("documentationUri", ConfigValue::DocumentationUri(uri)) => {
                self.documentation_uri = Some(uri);
            }
            (other, _) => {
                return Err(ScimError::invalid_value(format!(
                    "unknown ServiceProviderConfig key '{other}'"
                )));
            }
        }
        Ok(())
    }

    pub fn to_document(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "schemas".to_string(),
                serde_json::Value::Array(vec![serde_json::Value::String(
                    SERVICE_PROVIDER_CONFIG_SCHEMA.to_string(),
                )]),
            );
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc_example_shape() {
        let config = ServiceProviderConfig::default();
        assert!(!config.patch.supported);
        assert_eq!(config.bulk.max_operations, 1000);
        assert_eq!(config.bulk.max_payload_size, 1_048_576);
        assert_eq!(config.filter.max_results, 200);
    }

    #[test]
    fn numeric_shorthand_sets_bulk_max_operations_and_supported() {
        let mut config = ServiceProviderConfig::default();
        config.set("bulk", ConfigValue::Number(500.0)).unwrap();
        assert_eq!(config.bulk.max_operations, 500);
        assert!(config.bulk.supported);
    }

    #[test]
    fn empty_array_resets_authentication_schemes() {
        let mut config = ServiceProviderConfig::default();
        config
            .set(
                "authenticationSchemes",
                ConfigValue::Schemes(vec![AuthenticationScheme {
                    name: "oauth".into(),
                    description: "".into(),
                    scheme_type: "oauth2".into(),
                    spec_uri: None,
                    documentation_uri: None,
                }]),
            )
            .unwrap();
        assert_eq!(config.authentication_schemes.len(), 1);
        config.set("authenticationSchemes", ConfigValue::Schemes(vec![])).unwrap();
        assert!(config.authentication_schemes.is_empty());
    }

    #[test]
    fn unknown_key_rejected() {
        let mut config = ServiceProviderConfig::default();
        assert!(config.set("bogus", ConfigValue::Bool(true)).is_err());
    }
}
