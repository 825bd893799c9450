//! Filter matching against JSON values (RFC 7644 §3.4.2.2).

use super::{CompOp, Filter, Leaf};
use serde_json::Value;

/// Supplies per-attribute-path case-exactness so the matcher can honour
/// `caseExact` when a schema is available, falling back to
/// case-insensitive comparison otherwise (RFC 7643 §2.2).
pub trait AttributeCaseResolver {
    fn case_exact(&self, path: &str) -> Option<bool>;
}

pub(super) fn leaf_matches(leaf: &Leaf, item: &Value, resolver: Option<&dyn AttributeCaseResolver>) -> bool {
    match leaf {
        Leaf::Compare { path, op, value } => compare_matches(path, *op, value.as_ref(), item, resolver),
        Leaf::ValuePath { path, inner } => value_path_matches(path, inner, item, resolver),
    }
}

fn value_path_matches(path: &str, inner: &Filter, item: &Value, resolver: Option<&dyn AttributeCaseResolver>) -> bool {
    match get_path_ci(item, path) {
        Some(Value::Array(elements)) => elements.iter().any(|el| inner.is_satisfied_by(el, resolver)),
        Some(single) => inner.is_satisfied_by(single, resolver),
        None => false,
    }
}

fn compare_matches(
    path: &str,
    op: CompOp,
    expected: Option<&Value>,
    item: &Value,
    resolver: Option<&dyn AttributeCaseResolver>,
) -> bool {
    let actual = get_path_ci(item, path);

    if op == CompOp::Pr {
        return is_present(actual);
    }
    if op == CompOp::Np {
        return !is_present(actual);
    }

    let Some(actual) = actual else { return false };
    let Some(expected) = expected else { return false };

    match op {
        CompOp::Eq => values_equal(actual, expected, case_exact_for(resolver, path)),
        CompOp::Ne => !values_equal(actual, expected, case_exact_for(resolver, path)),
        CompOp::Co | CompOp::Sw | CompOp::Ew => {
            let (Value::String(a), Value::String(e)) = (actual, expected) else {
                return false;
            };
            let case_exact = case_exact_for(resolver, path);
            let (a, e) = normalize_case(a, e, case_exact);
            match op {
                CompOp::Co => a.contains(&e),
                CompOp::Sw => a.starts_with(&e),
                CompOp::Ew => a.ends_with(&e),
                _ => unreachable!(),
            }
        }
        CompOp::Gt | CompOp::Lt | CompOp::Ge | CompOp::Le => ordered_compare(op, actual, expected),
        CompOp::Pr | CompOp::Np => unreachable!("handled above"),
    }
}

fn case_exact_for(resolver: Option<&dyn AttributeCaseResolver>, path: &str) -> bool {
    resolver.and_then(|r| r.case_exact(path)).unwrap_or(false)
}

fn normalize_case(a: &str, b: &str, case_exact: bool) -> (String, String) {
    if case_exact {
        (a.to_string(), b.to_string())
    } else {
        (a.to_ascii_lowercase(), b.to_ascii_lowercase())
    }
}

fn values_equal(a: &Value, b: &Value, case_exact: bool) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            if case_exact {
                x == y
            } else {
                x.eq_ignore_ascii_case(y)
            }
        }
        _ => a == b,
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

fn ordered_compare(op: CompOp, a: &Value, b: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        x.partial_cmp(&y)
    } else if let (Value::String(x), Value::String(y)) = (a, b) {
        match (parse_rfc3339(x), parse_rfc3339(y)) {
            (Some(tx), Some(ty)) => tx.partial_cmp(&ty),
            _ => Some(x.cmp(y)),
        }
    } else {
        None
    };

    let Some(ordering) = ordering else { return false };
    match op {
        CompOp::Gt => ordering == Ordering::Greater,
        CompOp::Lt => ordering == Ordering::Less,
        CompOp::Ge => ordering != Ordering::Less,
        CompOp::Le => ordering != Ordering::Greater,
        _ => unreachable!(),
    }
}

fn parse_rfc3339(s: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    chrono::DateTime::parse_from_rfc3339(s).ok()
}

/// Case-insensitive, dot-separated traversal through JSON objects. Does not
/// descend into arrays; multi-valued complex attributes are addressed via
/// `Leaf::ValuePath` instead (RFC 7644 §3.4.2.2).
pub(crate) fn get_path_ci<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        let obj = current.as_object()?;
        current = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(segment))
            .map(|(_, v)| v)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use serde_json::json;

    #[test]
    fn pr_treats_empty_string_as_absent() {
        let f = Filter::parse("nickName pr").unwrap();
        assert!(!f.is_satisfied_by(&json!({"nickName": ""}), None));
        assert!(f.is_satisfied_by(&json!({"nickName": "x"}), None));
    }

    #[test]
    fn value_path_matches_any_array_element() {
        let f = Filter::parse(r#"emails[type eq "work"]"#).unwrap();
        let item = json!({"emails": [{"type": "home"}, {"type": "work"}]});
        assert!(f.is_satisfied_by(&item, None));
    }

    #[test]
    fn gt_compares_numerically() {
        let f = Filter::parse("age gt 30").unwrap();
        assert!(f.is_satisfied_by(&json!({"age": 31}), None));
        assert!(!f.is_satisfied_by(&json!({"age": 30}), None));
    }

    #[test]
    fn gt_compares_timestamps() {
        let f = Filter::parse(r#"meta.lastModified gt "2020-01-01T00:00:00Z""#).unwrap();
        let item = json!({"meta": {"lastModified": "2021-06-01T00:00:00Z"}});
        assert!(f.is_satisfied_by(&item, None));
    }

    #[test]
    fn case_insensitive_by_default() {
        let f = Filter::parse(r#"userName eq "BJENSEN""#).unwrap();
        assert!(f.is_satisfied_by(&json!({"userName": "bjensen"}), None));
    }
}
