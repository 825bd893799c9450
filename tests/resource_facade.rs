//! End-to-end resource façade scenarios over `InMemoryProvider`.

use scim_server::providers::InMemoryProvider;
use scim_server::resource::{Resource, ResourceParams};
use scim_server::schema::builtin::user_schema;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn create_read_patch_delete_round_trip() {
    let schema = user_schema();
    let provider: Arc<InMemoryProvider> = Arc::new(InMemoryProvider::new());

    let create = Resource::new("User", &schema, provider.clone(), None, ResourceParams::default(), true).unwrap();
    let created = create
        .write(&json!({
            "userName": "bjensen@example.com",
            "name": {"givenName": "Barbara", "familyName": "Jensen"},
        }))
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["userName"], "bjensen@example.com");

    let read = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { id: Some(id.clone()), ..Default::default() },
        true,
    )
    .unwrap();
    let fetched = read.read().await.unwrap();
    assert_eq!(fetched["name"]["familyName"], "Jensen");

    let patch = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { id: Some(id.clone()), ..Default::default() },
        true,
    )
    .unwrap();
    let patched = patch
        .patch(&json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [{"op": "replace", "path": "name.familyName", "value": "Jensen-Smith"}],
        }))
        .await
        .unwrap();
    assert_eq!(patched["name"]["familyName"], "Jensen-Smith");

    let delete = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { id: Some(id.clone()), ..Default::default() },
        true,
    )
    .unwrap();
    delete.dispose().await.unwrap();

    let read_after_delete = Resource::new(
        "User",
        &schema,
        provider,
        None,
        ResourceParams { id: Some(id), ..Default::default() },
        true,
    )
    .unwrap();
    assert!(read_after_delete.read().await.is_err());
}

#[tokio::test]
async fn list_filter_selects_matching_users() {
    let schema = user_schema();
    let provider: Arc<InMemoryProvider> = Arc::new(InMemoryProvider::new());

    for name in ["alice@example.com", "bob@example.com"] {
        let create = Resource::new("User", &schema, provider.clone(), None, ResourceParams::default(), true).unwrap();
        create.write(&json!({"userName": name})).await.unwrap();
    }

    let list = Resource::new(
        "User",
        &schema,
        provider,
        None,
        ResourceParams { filter: Some(r#"userName sw "alice""#.to_string()), ..Default::default() },
        true,
    )
    .unwrap();
    let results = list.read().await.unwrap();
    assert_eq!(results["totalResults"], 1);
}
