//! Canonical stringification of a normalised [`Filter`].

use super::{CompOp, Filter, Leaf};
use serde_json::Value;

pub fn stringify(filter: &Filter) -> String {
    let rendered: Vec<String> = filter
        .conjunctions
        .iter()
        .map(|conj| stringify_conjunction(conj))
        .collect();
    match rendered.len() {
        0 => String::new(),
        1 => rendered.into_iter().next().unwrap(),
        _ => rendered.join(" or "),
    }
}

fn stringify_conjunction(conj: &[Leaf]) -> String {
    let parts: Vec<String> = conj.iter().map(stringify_leaf).collect();
    if conj.len() > 1 {
        // Each leaf is atomic (comparison or bracketed value-path), so no
        // extra grouping parens are required around the conjunction itself.
        parts.join(" and ")
    } else {
        parts.into_iter().next().unwrap_or_default()
    }
}

fn stringify_leaf(leaf: &Leaf) -> String {
    match leaf {
        Leaf::Compare { path, op: CompOp::Pr, .. } => format!("{path} pr"),
        Leaf::Compare { path, op: CompOp::Np, .. } => format!("{path} np"),
        Leaf::Compare { path, op, value } => {
            let v = value.as_ref().map(stringify_value).unwrap_or_default();
            format!("{path} {} {v}", op.as_str())
        }
        Leaf::ValuePath { path, inner } => {
            format!("{path}[{}]", stringify_inner(inner))
        }
    }
}

/// Inner value-path filters use the same precedence rules as the top level
/// (`and` binds tighter than `or`), so no extra grouping parens are needed;
/// the surrounding `[...]` already delimits the whole thing.
fn stringify_inner(filter: &Filter) -> String {
    stringify(filter)
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", escape(s)),
        other => other.to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
