//! BulkRequest scheduler (RFC 7644 §3.7).
//!
//! Discovers `bulkId` cross-references among POST operations, schedules
//! them as cooperative tasks on the current tokio runtime, threads freshly
//! minted ids through later operations by textual `"bulkId:<id>"`
//! substitution, and enforces `failOnErrors`.

use crate::error::{ScimError, ScimResult, ErrorResponse};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

pub const BULK_REQUEST_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:BulkRequest";
pub const BULK_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:BulkResponse";

/// Host-supplied dispatch for a single bulk sub-operation. Implementations
/// map `path` to a registered resource type and invoke write/patch/dispose.
pub trait BulkDispatcher: Send + Sync {
    fn dispatch(
        &self,
        method: &str,
        path: &str,
        data: Option<Value>,
        version: Option<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ScimResult<BulkDispatchOutcome>> + Send + '_>>;
}

/// Result of dispatching a single bulk sub-operation.
pub struct BulkDispatchOutcome {
    pub status: u16,
    pub location: Option<String>,
    /// The server-assigned id, present on successful POST.
    pub new_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BulkOperation {
    pub method: String,
    pub path: String,
    pub bulk_id: Option<String>,
    pub data: Option<Value>,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BulkResponseOperation {
    pub method: String,
    pub bulk_id: Option<String>,
    pub location: Option<String>,
    pub status: u16,
    pub error: Option<ErrorResponse>,
}

pub struct BulkConfig {
    pub max_operations: usize,
    pub fail_on_errors: u32,
}

/// Parse and validate a BulkRequest envelope (RFC 7644 §3.7).
pub fn parse_envelope(envelope: &Value, config: &BulkConfig) -> ScimResult<(Vec<BulkOperation>, u32)> {
    let schemas = envelope
        .get("schemas")
        .and_then(Value::as_array)
        .ok_or_else(|| ScimError::invalid_syntax("BulkRequest envelope missing 'schemas'"))?;
    if schemas.len() != 1 || schemas[0].as_str() != Some(BULK_REQUEST_SCHEMA) {
        return Err(ScimError::invalid_syntax(format!(
            "BulkRequest envelope 'schemas' must be exactly ['{BULK_REQUEST_SCHEMA}']"
        )));
    }

    let fail_on_errors = match envelope.get("failOnErrors") {
        None => 0,
        Some(Value::Number(n)) if n.as_u64().is_some() => n.as_u64().unwrap() as u32,
        Some(_) => return Err(ScimError::invalid_value("'failOnErrors' must be a non-negative integer")),
    };

    let raw_ops = envelope
        .get("Operations")
        .and_then(Value::as_array)
        .ok_or_else(|| ScimError::invalid_syntax("BulkRequest envelope missing 'Operations'"))?;

    if raw_ops.is_empty() || raw_ops.len() > config.max_operations {
        return Err(ScimError::too_many(format!(
            "BulkRequest must contain between 1 and {} operations",
            config.max_operations
        )));
    }

    let mut operations = Vec::with_capacity(raw_ops.len());
    for raw in raw_ops {
        let method = raw
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| ScimError::invalid_syntax("bulk operation missing 'method'"))?
            .to_ascii_uppercase();
        if !matches!(method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE") {
            return Err(ScimError::invalid_syntax(format!("unsupported bulk method '{method}'")));
        }
        let path = raw
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ScimError::invalid_syntax("bulk operation missing 'path'"))?
            .to_string();
        let bulk_id = raw.get("bulkId").and_then(Value::as_str).map(str::to_string);
        if method == "POST" && bulk_id.as_deref().unwrap_or("").is_empty() {
            return Err(ScimError::invalid_value("POST bulk operation requires a non-empty 'bulkId'"));
        }
        let data = raw.get("data").cloned();
        if method == "DELETE" && data.is_some() {
            return Err(ScimError::invalid_syntax("DELETE bulk operation must not carry 'data'"));
        }
        let version = raw.get("version").and_then(Value::as_str).map(str::to_string);
        operations.push(BulkOperation { method, path, bulk_id, data, version });
    }

    Ok((operations, fail_on_errors))
}

/// References to `"bulkId:<id>"` tokens found in an operation's `data`.
fn referenced_bulk_ids(data: &Option<Value>, known_ids: &HashSet<String>) -> HashSet<String> {
    let Some(data) = data else { return HashSet::new() };
    let text = data.to_string();
    let mut found = HashSet::new();
    for id in known_ids {
        if text.contains(&format!("\"bulkId:{id}\"")) {
            found.insert(id.clone());
        }
    }
    found
}

/// Partition a bulkId dependency graph into strongly connected components
/// (Tarjan's algorithm), so cycles of any length are detected, not just
/// direct mutual references.
fn strongly_connected_components(adjacency: &HashMap<String, HashSet<String>>) -> Vec<Vec<String>> {
    struct Tarjan<'a> {
        adjacency: &'a HashMap<String, HashSet<String>>,
        counter: usize,
        stack: Vec<String>,
        on_stack: HashSet<String>,
        index: HashMap<String, usize>,
        lowlink: HashMap<String, usize>,
        sccs: Vec<Vec<String>>,
    }

    impl<'a> Tarjan<'a> {
        fn visit(&mut self, node: &str) {
            self.index.insert(node.to_string(), self.counter);
            self.lowlink.insert(node.to_string(), self.counter);
            self.counter += 1;
            self.stack.push(node.to_string());
            self.on_stack.insert(node.to_string());

            if let Some(neighbors) = self.adjacency.get(node) {
                for next in neighbors.clone() {
                    if !self.index.contains_key(&next) {
                        self.visit(&next);
                        let candidate = self.lowlink[&next];
                        let current = self.lowlink[node];
                        self.lowlink.insert(node.to_string(), current.min(candidate));
                    } else if self.on_stack.contains(&next) {
                        let candidate = self.index[&next];
                        let current = self.lowlink[node];
                        self.lowlink.insert(node.to_string(), current.min(candidate));
                    }
                }
            }

            if self.lowlink[node] == self.index[node] {
                let mut component = Vec::new();
                loop {
                    let member = self.stack.pop().expect("node pushed before lowlink closes");
                    self.on_stack.remove(&member);
                    let is_root = member == node;
                    component.push(member);
                    if is_root {
                        break;
                    }
                }
                self.sccs.push(component);
            }
        }
    }

    let mut tarjan = Tarjan {
        adjacency,
        counter: 0,
        stack: Vec::new(),
        on_stack: HashSet::new(),
        index: HashMap::new(),
        lowlink: HashMap::new(),
        sccs: Vec::new(),
    };
    for node in adjacency.keys() {
        if !tarjan.index.contains_key(node) {
            tarjan.visit(node);
        }
    }
    tarjan.sccs
}

fn substitute_bulk_id(data: &Value, id: &str, resolved: &str) -> Value {
    let token = format!("bulkId:{id}");
    match data {
        Value::String(s) if s == &token => Value::String(resolved.to_string()),
        Value::String(s) => Value::String(s.replace(&token, resolved)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_bulk_id(v, id, resolved)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_bulk_id(v, id, resolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}

struct Slot {
    tx: Option<oneshot::Sender<ScimResult<String>>>,
    rx: Option<oneshot::Receiver<ScimResult<String>>>,
}

/// Execute a validated BulkRequest against `dispatcher`, producing response
/// operations in request order (RFC 7644 §3.7).
pub async fn execute(
    operations: Vec<BulkOperation>,
    fail_on_errors: u32,
    dispatcher: Arc<dyn BulkDispatcher>,
) -> Vec<BulkResponseOperation> {
    info!("bulk request: {} operation(s), failOnErrors={}", operations.len(), fail_on_errors);
    let known_ids: HashSet<String> = operations
        .iter()
        .filter(|op| op.method == "POST")
        .filter_map(|op| op.bulk_id.clone())
        .collect();

    let waiting_on: Vec<HashSet<String>> = operations
        .iter()
        .map(|op| referenced_bulk_ids(&op.data, &known_ids))
        .collect();

    // Dependency graph over bulkIds: B -> the bulkIds B's data references.
    // Every strongly connected component with more than one member is a
    // reference cycle; exactly its earliest-discovered member breaks it
    // with a partial POST (RFC 7644 §3.7).
    let adjacency: HashMap<String, HashSet<String>> = operations
        .iter()
        .enumerate()
        .filter_map(|(idx, op)| op.bulk_id.as_ref().map(|id| (id.clone(), waiting_on[idx].clone())))
        .collect();
    let discovery_index: HashMap<String, usize> = operations
        .iter()
        .enumerate()
        .filter_map(|(idx, op)| op.bulk_id.as_ref().map(|id| (id.clone(), idx)))
        .collect();
    let mut cycle_breakers: HashSet<String> = HashSet::new();
    for component in strongly_connected_components(&adjacency) {
        if component.len() > 1 {
            if let Some(breaker) = component.iter().min_by_key(|id| discovery_index[*id]) {
                cycle_breakers.insert(breaker.clone());
            }
        }
    }

    let mut slots: HashMap<String, Arc<Mutex<Slot>>> = HashMap::new();
    for id in &known_ids {
        let (tx, rx) = oneshot::channel();
        slots.insert(id.clone(), Arc::new(Mutex::new(Slot { tx: Some(tx), rx: Some(rx) })));
    }

    let error_count = Arc::new(Mutex::new(0u32));
    let mut handles = Vec::with_capacity(operations.len());

    for (idx, op) in operations.into_iter().enumerate() {
        let dispatcher = dispatcher.clone();
        let slots = slots_for(&slots);
        let error_count = error_count.clone();
        let waiting_on_this = waiting_on[idx].clone();
        let is_cycle_breaker = op.bulk_id.as_ref().is_some_and(|id| cycle_breakers.contains(id));

        handles.push(tokio::spawn(run_operation(
            idx,
            op,
            waiting_on_this,
            is_cycle_breaker,
            slots,
            error_count,
            fail_on_errors,
            dispatcher,
        )));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Some(response)) => results.push(response),
            Ok(None) => {}
            Err(e) => warn!("bulk operation task panicked: {e}"),
        }
    }
    debug!("bulk request complete: {} response operation(s)", results.len());
    results
}

fn slots_for(slots: &HashMap<String, Arc<Mutex<Slot>>>) -> HashMap<String, Arc<Mutex<Slot>>> {
    slots.clone()
}

#[allow(clippy::too_many_arguments)]
async fn run_operation(
    index: usize,
    op: BulkOperation,
    waiting_on: HashSet<String>,
    is_cycle_breaker: bool,
    slots: HashMap<String, Arc<Mutex<Slot>>>,
    error_count: Arc<Mutex<u32>>,
    fail_on_errors: u32,
    dispatcher: Arc<dyn BulkDispatcher>,
) -> Option<BulkResponseOperation> {
    if fail_on_errors > 0 && *error_count.lock().await >= fail_on_errors {
        return None;
    }

    let mut data = op.data.clone();
    let mut own_id: Option<String> = None;

    if is_cycle_breaker {
        debug!("bulk op {index} ({:?}): breaking reference cycle with partial POST", op.bulk_id);
        // Partial POST: strip every bulkId token from our own data so the
        // rest of the cycle can make progress, obtain a real id, and
        // resolve our own slot immediately (RFC 7644 §3.7).
        let stripped = data.as_ref().map(strip_bulk_id_tokens);
        match dispatcher.dispatch(&op.method, &op.path, stripped, op.version.clone()).await {
            Ok(outcome) => {
                own_id = outcome.new_id.clone();
                if let (Some(bulk_id), Some(id)) = (&op.bulk_id, &outcome.new_id) {
                    if let Some(slot) = slots.get(bulk_id) {
                        let mut guard = slot.lock().await;
                        if let Some(tx) = guard.tx.take() {
                            let _ = tx.send(Ok(id.clone()));
                        }
                    }
                }
            }
            Err(e) => {
                bump_error_count(&error_count).await;
                if let Some(bulk_id) = &op.bulk_id {
                    if let Some(slot) = slots.get(bulk_id) {
                        let mut guard = slot.lock().await;
                        if let Some(tx) = guard.tx.take() {
                            let _ = tx.send(Err(ScimError::internal(e.to_string())));
                        }
                    }
                }
                return Some(error_response(&op, &e));
            }
        }
    }

    for referenced in &waiting_on {
        let Some(slot) = slots.get(referenced) else { continue };
        let resolved = {
            let mut guard = slot.lock().await;
            match guard.rx.take() {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(ScimError::internal("bulk slot dropped"))),
                None => Err(ScimError::internal("bulk slot already awaited")),
            }
        };
        match resolved {
            Ok(id) => {
                if let Some(current) = data {
                    data = Some(substitute_bulk_id(&current, referenced, &id));
                }
            }
            Err(_) => {
                let exhausted = fail_on_errors > 0 && *error_count.lock().await >= fail_on_errors;
                if exhausted {
                    return None;
                }
                bump_error_count(&error_count).await;
                return Some(BulkResponseOperation {
                    method: op.method.clone(),
                    bulk_id: op.bulk_id.clone(),
                    location: None,
                    status: 412,
                    error: Some(ErrorResponse::new(
                        412,
                        None,
                        format!("Referenced POST operation with bulkId '{referenced}' was not successful"),
                    )),
                });
            }
        }
    }

    if let Some(id) = &own_id {
        // Cycle was broken above with a partial POST; now that every
        // reference has been substituted, commit the full data with a
        // follow-up update (RFC 7644 §3.7).
        let location = format!("{}/{id}", op.path);
        if let Some(full_data) = data {
            if dispatcher.dispatch("PUT", &location, Some(full_data), None).await.is_err() {
                bump_error_count(&error_count).await;
            }
        }
        return Some(BulkResponseOperation {
            method: op.method.clone(),
            bulk_id: op.bulk_id.clone(),
            location: Some(location),
            status: 201,
            error: None,
        });
    }

    match dispatcher.dispatch(&op.method, &op.path, data, op.version.clone()).await {
        Ok(outcome) => {
            if let (Some(bulk_id), Some(id)) = (&op.bulk_id, &outcome.new_id) {
                if let Some(slot) = slots.get(bulk_id) {
                    let mut guard = slot.lock().await;
                    if let Some(tx) = guard.tx.take() {
                        let _ = tx.send(Ok(id.clone()));
                    }
                }
            }
            Some(BulkResponseOperation {
                method: op.method.clone(),
                bulk_id: op.bulk_id.clone(),
                location: outcome.location,
                status: outcome.status,
                error: None,
            })
        }
        Err(e) => {
            bump_error_count(&error_count).await;
            if let Some(bulk_id) = &op.bulk_id {
                if let Some(slot) = slots.get(bulk_id) {
                    let mut guard = slot.lock().await;
                    if let Some(tx) = guard.tx.take() {
                        let _ = tx.send(Err(ScimError::internal(e.to_string())));
                    }
                }
            }
            Some(error_response(&op, &e))
        }
    }
}

async fn bump_error_count(counter: &Arc<Mutex<u32>>) {
    let mut guard = counter.lock().await;
    *guard += 1;
}

fn error_response(op: &BulkOperation, err: &ScimError) -> BulkResponseOperation {
    BulkResponseOperation {
        method: op.method.clone(),
        bulk_id: op.bulk_id.clone(),
        location: None,
        status: err.http_status(),
        error: Some(err.to_error_response()),
    }
}

fn strip_bulk_id_tokens(value: &Value) -> Value {
    match value {
        Value::String(s) if s.starts_with("bulkId:") => Value::Null,
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => Value::Array(items.iter().map(strip_bulk_id_tokens).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let stripped = strip_bulk_id_tokens(v);
                if !stripped.is_null() || !v.as_str().is_some_and(|s| s.starts_with("bulkId:")) {
                    out.insert(k.clone(), stripped);
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Serialize response operations into the BulkResponse envelope (RFC 7644 §3.7).
pub fn to_envelope(operations: Vec<BulkResponseOperation>) -> Value {
    let ops: Vec<Value> = operations
        .into_iter()
        .map(|op| {
            let mut obj = Map::new();
            obj.insert("method".to_string(), Value::String(op.method));
            if let Some(bulk_id) = op.bulk_id {
                obj.insert("bulkId".to_string(), Value::String(bulk_id));
            }
            if let Some(location) = op.location {
                obj.insert("location".to_string(), Value::String(location));
            }
            obj.insert("status".to_string(), Value::String(op.status.to_string()));
            if let Some(error) = op.error {
                obj.insert("response".to_string(), serde_json::to_value(error).unwrap());
            }
            Value::Object(obj)
        })
        .collect();
    serde_json::json!({
        "schemas": [BULK_RESPONSE_SCHEMA],
        "Operations": ops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingDispatcher {
        next_id: AtomicU64,
    }

    impl BulkDispatcher for CountingDispatcher {
        fn dispatch(
            &self,
            method: &str,
            path: &str,
            _data: Option<Value>,
            _version: Option<String>,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ScimResult<BulkDispatchOutcome>> + Send + '_>> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let method = method.to_string();
            let path = path.to_string();
            Box::pin(async move {
                if method == "POST" {
                    let new_id = format!("id-{id}");
                    Ok(BulkDispatchOutcome {
                        status: 201,
                        location: Some(format!("{path}/{new_id}")),
                        new_id: Some(new_id),
                    })
                } else {
                    Ok(BulkDispatchOutcome { status: 200, location: Some(path), new_id: None })
                }
            })
        }
    }

    fn config() -> BulkConfig {
        BulkConfig { max_operations: 1000, fail_on_errors: 0 }
    }

    #[test]
    fn rejects_wrong_schema() {
        let envelope = json!({"schemas": ["wrong"], "Operations": []});
        assert!(parse_envelope(&envelope, &config()).is_err());
    }

    #[test]
    fn rejects_too_many_operations() {
        let ops: Vec<Value> = (0..5)
            .map(|i| json!({"method": "POST", "path": "/Users", "bulkId": format!("b{i}"), "data": {}}))
            .collect();
        let envelope = json!({"schemas": [BULK_REQUEST_SCHEMA], "Operations": ops});
        let config = BulkConfig { max_operations: 2, fail_on_errors: 0 };
        let err = parse_envelope(&envelope, &config).unwrap_err();
        assert_eq!(err.http_status(), 413);
    }

    #[tokio::test]
    async fn linear_dependency_resolves_bulk_id() {
        let envelope = json!({
            "schemas": [BULK_REQUEST_SCHEMA],
            "Operations": [
                {"method": "POST", "path": "/Users", "bulkId": "A", "data": {"manager": "bulkId:B"}},
                {"method": "POST", "path": "/Users", "bulkId": "B", "data": {"name": "b"}}
            ]
        });
        let (operations, fail_on_errors) = parse_envelope(&envelope, &config()).unwrap();
        let dispatcher = Arc::new(CountingDispatcher { next_id: AtomicU64::new(0) });
        let results = execute(operations, fail_on_errors, dispatcher).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == 201));
    }

    #[tokio::test]
    async fn cycle_is_resolved_with_both_succeeding() {
        let envelope = json!({
            "schemas": [BULK_REQUEST_SCHEMA],
            "Operations": [
                {"method": "POST", "path": "/Users", "bulkId": "A", "data": {"name": "a", "partner": "bulkId:B"}},
                {"method": "POST", "path": "/Users", "bulkId": "B", "data": {"name": "b", "partner": "bulkId:A"}}
            ]
        });
        let (operations, fail_on_errors) = parse_envelope(&envelope, &config()).unwrap();
        let dispatcher = Arc::new(CountingDispatcher { next_id: AtomicU64::new(0) });
        let results = execute(operations, fail_on_errors, dispatcher).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == 201));
    }
}
