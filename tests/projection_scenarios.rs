//! SchemaDefinition coerce-out projection scenarios.

use scim_server::schema::{AttrType, Attribute, Direction, Returned, SchemaDefinition};
use scim_server::Filter;
use serde_json::json;

fn schema() -> SchemaDefinition {
    SchemaDefinition::new(
        "urn:example:schemas:Thing",
        "Thing",
        "",
        vec![
            Attribute::primitive("userName", AttrType::String),
            Attribute::primitive("password", AttrType::String).returned(Returned::Never),
        ],
    )
    .unwrap()
}

#[test]
fn never_returned_attribute_is_dropped_regardless_of_projection() {
    let schema = schema();
    let filter = Filter::parse(r#"userName pr"#).unwrap();
    let out = schema
        .coerce(&json!({"userName": "x", "password": "y"}), Direction::Out, None, None, Some(&filter))
        .unwrap();
    assert_eq!(out["userName"], "x");
    assert!(out.get("password").is_none());
}

#[test]
fn projection_without_filter_keeps_default_returned_attributes() {
    let schema = schema();
    let out = schema.coerce(&json!({"userName": "x"}), Direction::Out, None, None, None).unwrap();
    assert_eq!(out["userName"], "x");
}
