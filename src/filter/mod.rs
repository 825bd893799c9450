//! SCIM filter language: parser, normalised AST, stringifier, matcher and
//! the projection mode used for `attributes`/`excludedAttributes` selection
//! (RFC 7644 §3.4.2.2).
//!
//! A [`Filter`] is always stored in normalised form: a disjunction of
//! conjunctions of [`Leaf`] expressions. Parsing produces this form
//! directly (De Morgan pushes `not` down during parsing); [`Filter::parse`]
//! and [`Filter::to_string`] are the two directions of a round-trip:
//! parsing then stringifying a filter yields an equivalent normalised form.

mod lexer;
mod matcher;
mod parser;
mod stringify;

pub use matcher::AttributeCaseResolver;

use serde_json::Value;

/// Comparator operators from RFC 7644 §3.4.2.2, plus the internal `np`
/// ("not present") extension used only by the projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Co,
    Sw,
    Ew,
    Gt,
    Lt,
    Ge,
    Le,
    Pr,
    /// Internal-only: never parsed from or stringified to user input.
    Np,
}

impl CompOp {
    pub fn negate(self) -> CompOp {
        match self {
            CompOp::Eq => CompOp::Ne,
            CompOp::Ne => CompOp::Eq,
            CompOp::Pr => CompOp::Np,
            CompOp::Np => CompOp::Pr,
            // The other comparators have no direct negation in the
            // language; callers that need `not (a gt b)` keep the `not`
            // wrapping instead of flattening it (see `parser::negate_leaf`).
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompOp::Eq => "eq",
            CompOp::Ne => "ne",
            CompOp::Co => "co",
            CompOp::Sw => "sw",
            CompOp::Ew => "ew",
            CompOp::Gt => "gt",
            CompOp::Lt => "lt",
            CompOp::Ge => "ge",
            CompOp::Le => "le",
            CompOp::Pr => "pr",
            CompOp::Np => "np",
        }
    }
}

/// A single leaf expression inside a conjunction: either a direct
/// comparison, or a value-path filter scoping a nested filter onto a
/// complex (possibly multi-valued) attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Compare {
        path: String,
        op: CompOp,
        value: Option<Value>,
    },
    ValuePath {
        path: String,
        inner: Filter,
    },
}

impl Leaf {
    pub fn path(&self) -> &str {
        match self {
            Leaf::Compare { path, .. } => path,
            Leaf::ValuePath { path, .. } => path,
        }
    }

    fn negate(self) -> Leaf {
        match self {
            Leaf::Compare { path, op, value } => Leaf::Compare {
                path,
                op: op.negate(),
                value,
            },
            // `not` distributed over a value-path negates every leaf in the
            // inner filter (RFC 7644 §3.4.2.2: "not over non-comparison leaves
            // collapses to the normalised form with all leaves negated").
            Leaf::ValuePath { path, inner } => Leaf::ValuePath {
                path,
                inner: inner.negate_all_leaves(),
            },
        }
    }
}

/// A conjunction (AND) of leaves.
pub type Conjunction = Vec<Leaf>;

/// The normalised SCIM filter form: a disjunction (OR) of conjunctions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub conjunctions: Vec<Conjunction>,
}

impl Filter {
    pub fn new(conjunctions: Vec<Conjunction>) -> Self {
        Self { conjunctions }
    }

    /// Parse a SCIM filter string into normalised form (RFC 7644 §3.4.2.2).
    pub fn parse(input: &str) -> crate::error::ScimResult<Self> {
        parser::parse(input)
    }

    /// Render the canonical string form.
    pub fn to_canonical_string(&self) -> String {
        stringify::stringify(self)
    }

    /// Build a synthetic projection filter: `pr` for each requested
    /// attribute, `np` for each excluded one (RFC 7644 §3.9).
    pub fn projection(attributes: &[String], excluded: &[String]) -> Self {
        let mut leaves = Vec::new();
        for a in attributes {
            leaves.push(Leaf::Compare {
                path: a.clone(),
                op: CompOp::Pr,
                value: None,
            });
        }
        for e in excluded {
            leaves.push(Leaf::Compare {
                path: e.clone(),
                op: CompOp::Np,
                value: None,
            });
        }
        Filter::new(vec![leaves])
    }

    /// All leaves across every conjunction, flattened. Used by the
    /// projection engine, which treats `pr`/`np` leaves independently of
    /// AND/OR grouping (RFC 7644 §3.9).
    pub fn all_leaves(&self) -> impl Iterator<Item = &Leaf> {
        self.conjunctions.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.conjunctions.is_empty() || self.conjunctions.iter().all(|c| c.is_empty())
    }

    /// Return the items for which at least one conjunction is fully
    /// satisfied (RFC 7644 §3.4.2.2). `resolver` supplies per-path case-exactness
    /// and type hints; pass `None` to fall back to case-insensitive string
    /// comparison and best-effort numeric/date detection.
    pub fn matches<'a>(
        &self,
        items: &'a [Value],
        resolver: Option<&dyn AttributeCaseResolver>,
    ) -> Vec<&'a Value> {
        items
            .iter()
            .filter(|item| self.is_satisfied_by(item, resolver))
            .collect()
    }

    pub fn is_satisfied_by(&self, item: &Value, resolver: Option<&dyn AttributeCaseResolver>) -> bool {
        if self.conjunctions.is_empty() {
            return true;
        }
        self.conjunctions
            .iter()
            .any(|conj| conj.iter().all(|leaf| matcher::leaf_matches(leaf, item, resolver)))
    }

    fn negate_all_leaves(&self) -> Filter {
        Filter::new(
            self.conjunctions
                .iter()
                .map(|c| c.iter().cloned().map(Leaf::negate).collect())
                .collect(),
        )
    }
}
