//! Process-wide schema and resource-type registries: constructed once at
//! startup, read-only during request
//! handling.

use crate::error::{ScimError, ScimResult};
use crate::resource::ResourceProvider;
use crate::schema::SchemaDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A named binding of an endpoint path, a primary schema, zero or more
/// extension schemas, and a provider (spec glossary "Resource type").
pub struct ResourceType {
    pub name: String,
    pub endpoint: String,
    pub schema: Arc<SchemaDefinition>,
    pub schema_extensions: Vec<(Arc<SchemaDefinition>, bool)>,
    pub provider: Arc<dyn ResourceProvider>,
}

impl ResourceType {
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ResourceType"],
            "id": self.name,
            "name": self.name,
            "endpoint": self.endpoint,
            "schema": self.schema.id,
            "schemaExtensions": self.schema_extensions.iter().map(|(s, required)| {
                serde_json::json!({"schema": s.id, "required": required})
            }).collect::<Vec<_>>(),
        })
    }
}

/// Registry of [`SchemaDefinition`]s keyed by URN id.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaDefinition>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: Arc<SchemaDefinition>) -> ScimResult<()> {
        if self.schemas.contains_key(&schema.id) {
            return Err(ScimError::invalid_value(format!("schema '{}' already registered", schema.id)));
        }
        self.schemas.insert(schema.id.clone(), schema);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SchemaDefinition>> {
        self.schemas.get(id)
    }

    pub fn describe_all(&self) -> Vec<Value> {
        self.schemas
            .values()
            .map(|s| {
                serde_json::json!({
                    "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Schema"],
                    "id": s.id,
                    "name": s.name,
                    "description": s.description,
                })
            })
            .collect()
    }
}

/// Registry of [`ResourceType`]s keyed by type name and by endpoint.
#[derive(Default)]
pub struct ResourceTypeRegistry {
    by_name: HashMap<String, Arc<ResourceType>>,
    by_endpoint: HashMap<String, Arc<ResourceType>>,
}

impl ResourceTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource_type: ResourceType) -> ScimResult<()> {
        if self.by_name.contains_key(&resource_type.name) {
            return Err(ScimError::invalid_value(format!(
                "resource type '{}' already registered",
                resource_type.name
            )));
        }
        let rt = Arc::new(resource_type);
        self.by_name.insert(rt.name.clone(), rt.clone());
        self.by_endpoint.insert(rt.endpoint.clone(), rt);
        Ok(())
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<ResourceType>> {
        self.by_name.get(name)
    }

    pub fn by_endpoint(&self, endpoint: &str) -> Option<&Arc<ResourceType>> {
        self.by_endpoint.get(endpoint)
    }

    pub fn describe_all(&self) -> Vec<Value> {
        self.by_name.values().map(|rt| rt.describe()).collect()
    }
}
