//! Reference [`ResourceProvider`] backed by an in-process map. Used by this
//! crate's own tests and by the `demos/` walkthrough; hosts are expected to
//! supply their own backend-specific provider.

use crate::error::{ScimError, ScimResult};
use crate::resource::provider::{EgressResult, RequestContext, ResourceProvider};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryProvider {
    store: Mutex<HashMap<String, Value>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self { store: Mutex::new(HashMap::new()) }
    }

    pub fn seed(&self, id: impl Into<String>, document: Value) {
        self.store.lock().unwrap().insert(id.into(), document);
    }
}

impl ResourceProvider for InMemoryProvider {
    fn egress<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> Pin<Box<dyn Future<Output = ScimResult<EgressResult>> + Send + 'a>> {
        Box::pin(async move {
            let store = self.store.lock().unwrap();
            match &ctx.id {
                Some(id) => Ok(EgressResult::Single(store.get(id).cloned())),
                None => Ok(EgressResult::Many(store.values().cloned().collect())),
            }
        })
    }

    fn ingress<'a>(
        &'a self,
        ctx: &'a RequestContext,
        mut data: Value,
        _existing: Option<Value>,
    ) -> Pin<Box<dyn Future<Output = ScimResult<Value>> + Send + 'a>> {
        Box::pin(async move {
            let mut store = self.store.lock().unwrap();
            let id = match &ctx.id {
                Some(id) => id.clone(),
                None => {
                    let id = Uuid::new_v4().to_string();
                    if let Some(obj) = data.as_object_mut() {
                        obj.insert("id".to_string(), Value::String(id.clone()));
                    }
                    id
                }
            };
            store.insert(id, data.clone());
            Ok(data)
        })
    }

    fn degress<'a>(&'a self, ctx: &'a RequestContext) -> Pin<Box<dyn Future<Output = ScimResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let Some(id) = &ctx.id else {
                return Err(ScimError::invalid_value("dispose requires an id"));
            };
            let mut store = self.store.lock().unwrap();
            if store.remove(id).is_none() {
                return Err(ScimError::not_found(&ctx.resource_type, id.clone()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_fetch() {
        let provider = InMemoryProvider::new();
        let ctx = RequestContext { resource_type: "User".into(), id: None, filter: None };
        let created = provider.ingress(&ctx, serde_json::json!({"userName": "bjensen"}), None).await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let ctx = RequestContext { resource_type: "User".into(), id: Some(id), filter: None };
        match provider.egress(&ctx).await.unwrap() {
            EgressResult::Single(Some(doc)) => assert_eq!(doc["userName"], "bjensen"),
            _ => panic!("expected a single document"),
        }
    }

    #[tokio::test]
    async fn dispose_missing_id_fails() {
        let provider = InMemoryProvider::new();
        let ctx = RequestContext { resource_type: "User".into(), id: Some("missing".into()), filter: None };
        assert!(provider.degress(&ctx).await.is_err());
    }
}
