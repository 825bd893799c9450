//! Walks through creating, reading, filtering and patching a User via
//! [`InMemoryProvider`], without any transport layer in front of it.
//!
//! Run with `cargo run --example basic_usage` once `demos` is wired as an
//! `[[example]]` target, or treat it as a reading companion to
//! `resource::Resource`.

use scim_server::providers::InMemoryProvider;
use scim_server::resource::{Resource, ResourceParams};
use scim_server::schema::builtin::user_schema;
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schema = user_schema();
    let provider: Arc<InMemoryProvider> = Arc::new(InMemoryProvider::new());

    let create = Resource::new(
        "User",
        &schema,
        provider.clone(),
        Some("https://example.com/scim/v2/Users".to_string()),
        ResourceParams::default(),
        true,
    )?;
    let created = create
        .write(&json!({
            "userName": "bjensen@example.com",
            "name": {"givenName": "Barbara", "familyName": "Jensen"},
            "emails": [{"value": "bjensen@example.com", "type": "work", "primary": true}],
        }))
        .await?;
    let id = created["id"].as_str().unwrap().to_string();
    println!("created {id}");

    let read = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { id: Some(id.clone()), ..Default::default() },
        true,
    )?;
    let fetched = read.read().await?;
    println!("fetched userName={}", fetched["userName"]);

    let list = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { filter: Some(r#"userName sw "bjensen""#.to_string()), ..Default::default() },
        true,
    )?;
    let results = list.read().await?;
    println!("filtered {} result(s)", results["totalResults"]);

    let patch = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { id: Some(id.clone()), ..Default::default() },
        true,
    )?;
    let patched = patch
        .patch(&json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [{"op": "replace", "path": "name.familyName", "value": "Jensen-Smith"}],
        }))
        .await?;
    println!("patched familyName={}", patched["name"]["familyName"]);

    let delete = Resource::new(
        "User",
        &schema,
        provider.clone(),
        None,
        ResourceParams { id: Some(id), ..Default::default() },
        true,
    )?;
    delete.dispose().await?;
    println!("deleted");

    Ok(())
}
