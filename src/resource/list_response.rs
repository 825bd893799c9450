//! Sorting and pagination of a coerced resource set (RFC 7644 §3.4.2).

use crate::error::{ScimError, ScimResult};
use serde_json::Value;
use std::cmp::Ordering;

pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn parse(s: &str) -> ScimResult<Self> {
        match s {
            "ascending" => Ok(SortOrder::Ascending),
            "descending" => Ok(SortOrder::Descending),
            other => Err(ScimError::invalid_value(format!(
                "sortOrder must be 'ascending' or 'descending', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub start_index: Option<i64>,
    pub count: Option<i64>,
}

pub struct ListResponse {
    pub resources: Vec<Value>,
    pub start_index: i64,
    pub items_per_page: i64,
    pub total_results: i64,
}

impl ListResponse {
    /// Build a paginated, sorted response (RFC 7644 §3.4.2). `total_results`
    /// overrides the pre-pagination count when the caller already knows the
    /// true backend total (e.g. the provider applied its own limit).
    pub fn build(mut resources: Vec<Value>, params: &ListParams, total_results: Option<i64>) -> ScimResult<Self> {
        if let Some(start_index) = params.start_index {
            if start_index < 1 {
                return Err(ScimError::invalid_value("startIndex must be >= 1"));
            }
        }
        if let Some(count) = params.count {
            if count < 0 {
                return Err(ScimError::invalid_value("count must be >= 0"));
            }
        }

        let total = total_results.unwrap_or(resources.len() as i64);

        if let Some(sort_by) = &params.sort_by {
            let order = params.sort_order.unwrap_or(SortOrder::Ascending);
            resources.sort_by(|a, b| compare_by_path(a, b, sort_by, order));
        }

        let start_index = params.start_index.unwrap_or(1);
        let skip = (start_index - 1).max(0) as usize;
        let page: Vec<Value> = resources.into_iter().skip(skip).collect();
        let items_per_page = params.count.map(|c| c as usize).unwrap_or(page.len());
        let page: Vec<Value> = page.into_iter().take(items_per_page).collect();
        let items_per_page = page.len() as i64;

        Ok(Self { resources: page, start_index, items_per_page, total_results: total })
    }

    pub fn to_envelope(&self) -> Value {
        serde_json::json!({
            "schemas": [LIST_RESPONSE_SCHEMA],
            "totalResults": self.total_results,
            "startIndex": self.start_index,
            "itemsPerPage": self.items_per_page,
            "Resources": self.resources,
        })
    }
}

fn resolve_sort_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        match current {
            Value::Array(items) => {
                let chosen = items
                    .iter()
                    .find(|v| v.get("primary").and_then(Value::as_bool) == Some(true))
                    .or_else(|| items.first())?;
                current = chosen;
                current = current.as_object()?.iter().find(|(k, _)| k.eq_ignore_ascii_case(segment))?.1;
            }
            Value::Object(obj) => {
                current = obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(segment))?.1;
            }
            _ => return None,
        }
    }
    Some(current)
}

fn compare_by_path(a: &Value, b: &Value, path: &str, order: SortOrder) -> Ordering {
    let av = resolve_sort_value(a, path);
    let bv = resolve_sort_value(b, path);
    let ordering = match (av, bv) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_values(x, y),
    };
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        if let (Ok(tx), Ok(ty)) = (
            chrono::DateTime::parse_from_rfc3339(x),
            chrono::DateTime::parse_from_rfc3339(y),
        ) {
            return tx.cmp(&ty);
        }
        return x.cmp(y);
    }
    Ordering::Equal
}
