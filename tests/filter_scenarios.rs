//! Filter matching scenarios.

use scim_server::Filter;
use serde_json::json;

#[test]
fn starts_with_matches_both_usernames() {
    let items = vec![json!({"id": "1", "userName": "A"}), json!({"id": "2", "userName": "AB"})];
    let filter = Filter::parse(r#"userName sw "A""#).unwrap();
    let matched = filter.matches(&items, None);
    assert_eq!(matched.len(), 2);
}

#[test]
fn equality_matches_only_exact_username() {
    let items = vec![json!({"id": "1", "userName": "A"}), json!({"id": "2", "userName": "AB"})];
    let filter = Filter::parse(r#"userName eq "A""#).unwrap();
    let matched = filter.matches(&items, None);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0]["id"], "1");
}

#[test]
fn value_path_filter_selects_matching_multi_valued_element() {
    let items = vec![json!({
        "id": "1",
        "emails": [
            {"value": "a@x", "type": "work"},
            {"value": "b@x", "type": "home"},
        ]
    })];
    let filter = Filter::parse(r#"emails[type eq "work" and value co "a"]"#).unwrap();
    let matched = filter.matches(&items, None);
    assert_eq!(matched.len(), 1);
}

#[test]
fn canonical_stringify_round_trips() {
    let s = r#"userName sw "A" and active eq true"#;
    let filter = Filter::parse(s).unwrap();
    let restringified = filter.to_canonical_string();
    let reparsed = Filter::parse(&restringified).unwrap();
    assert_eq!(reparsed.to_canonical_string(), restringified);
}
