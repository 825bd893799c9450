//! Property-based tests for PatchOp determinism.

use proptest::prelude::*;
use scim_server::patch;
use scim_server::schema::{AttrType, Attribute, SchemaDefinition};
use serde_json::json;

fn schema() -> SchemaDefinition {
    SchemaDefinition::new(
        "urn:example:schemas:Thing",
        "Thing",
        "",
        vec![Attribute::primitive("userName", AttrType::String)],
    )
    .unwrap()
}

fn replace_username_envelope(value: &str) -> serde_json::Value {
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
        "Operations": [{"op": "replace", "path": "userName", "value": value}]
    })
}

proptest! {
    #[test]
    fn replaying_the_same_operation_is_idempotent(name in "[a-zA-Z0-9]{1,16}") {
        let schema = schema();
        let baseline = json!({"userName": "initial"});
        let envelope = replace_username_envelope(&name);

        let once = patch::apply(&baseline, &envelope, &schema).unwrap();
        let first_result = once.clone().unwrap_or(baseline.clone());
        let twice = patch::apply(&first_result, &envelope, &schema).unwrap();

        prop_assert!(twice.is_none());
    }

    #[test]
    fn applying_from_two_equal_starting_points_yields_equal_results(name in "[a-zA-Z0-9]{1,16}") {
        let schema = schema();
        let baseline_a = json!({"userName": "initial"});
        let baseline_b = json!({"userName": "initial"});
        let envelope = replace_username_envelope(&name);

        let result_a = patch::apply(&baseline_a, &envelope, &schema).unwrap();
        let result_b = patch::apply(&baseline_b, &envelope, &schema).unwrap();

        prop_assert_eq!(result_a, result_b);
    }
}
