//! BulkRequest scheduler scenarios, driven through the public `bulk` API.

use scim_server::bulk::{self, BulkConfig, BulkDispatchOutcome, BulkDispatcher};
use scim_server::error::{ScimError, ScimResult};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct RecordingDispatcher {
    next_id: AtomicU64,
    committed: Mutex<Vec<Value>>,
}

impl BulkDispatcher for RecordingDispatcher {
    fn dispatch(
        &self,
        method: &str,
        path: &str,
        data: Option<Value>,
        _version: Option<String>,
    ) -> Pin<Box<dyn Future<Output = ScimResult<BulkDispatchOutcome>> + Send + '_>> {
        let method = method.to_string();
        let path = path.to_string();
        Box::pin(async move {
            if let Some(data) = &data {
                self.committed.lock().unwrap().push(data.clone());
            }
            if method == "POST" {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let new_id = format!("id-{id}");
                Ok(BulkDispatchOutcome { status: 201, location: Some(format!("{path}/{new_id}")), new_id: Some(new_id) })
            } else {
                Ok(BulkDispatchOutcome { status: 200, location: Some(path), new_id: None })
            }
        })
    }
}

struct FailingDispatcher;

impl BulkDispatcher for FailingDispatcher {
    fn dispatch(
        &self,
        _method: &str,
        _path: &str,
        _data: Option<Value>,
        _version: Option<String>,
    ) -> Pin<Box<dyn Future<Output = ScimResult<BulkDispatchOutcome>> + Send + '_>> {
        Box::pin(async { Err(ScimError::invalid_value("always fails")) })
    }
}

#[tokio::test]
async fn linear_dependency_manager_resolves_to_referenced_id() {
    let envelope = json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:BulkRequest"],
        "Operations": [
            {"method": "POST", "path": "/Users", "bulkId": "A", "data": {"manager": "bulkId:B"}},
            {"method": "POST", "path": "/Users", "bulkId": "B", "data": {"name": "b"}}
        ]
    });
    let config = BulkConfig { max_operations: 100, fail_on_errors: 0 };
    let (operations, fail_on_errors) = bulk::parse_envelope(&envelope, &config).unwrap();
    let dispatcher = Arc::new(RecordingDispatcher { next_id: AtomicU64::new(0), committed: Mutex::new(Vec::new()) });
    let results = bulk::execute(operations, fail_on_errors, dispatcher.clone()).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == 201));

    let committed = dispatcher.committed.lock().unwrap();
    let a_data = committed.iter().find(|d| d.get("manager").is_some()).unwrap();
    assert!(a_data["manager"].as_str().unwrap().starts_with("id-"));
    assert_ne!(a_data["manager"], "bulkId:B");
}

#[tokio::test]
async fn error_budget_caps_response_length() {
    let envelope = json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:BulkRequest"],
        "Operations": [
            {"method": "POST", "path": "/Users", "bulkId": "A", "data": {"name": "a"}},
            {"method": "POST", "path": "/Users", "bulkId": "B", "data": {"name": "b"}},
            {"method": "POST", "path": "/Users", "bulkId": "C", "data": {"name": "c"}}
        ]
    });
    let config = BulkConfig { max_operations: 100, fail_on_errors: 1 };
    let (operations, fail_on_errors) = bulk::parse_envelope(&envelope, &config).unwrap();
    let request_len = operations.len();
    let results = bulk::execute(operations, fail_on_errors, Arc::new(FailingDispatcher)).await;
    assert!(results.len() <= request_len);
    assert!(results.iter().any(|r| r.status >= 400));
}
