//! Bound parameters and the keys they are stored under.
//!
//! Every literal reaching a statement is bound under a synthetic key built from
//! a prefix, the [`IndexPath`] of the condition tree it came from and its
//! position in that tree. The SQL refers to it with a named placeholder:
//!
//! ```text
//! #{request.filter.filter_v0_tl_0}
//!   ^root   ^namespace ^key
//! ```
//!
//! Path segments below the root always start with a letter tag (`tl`, `ofl2`,
//! `s0`, ...), so a key can never be mistaken for a key of another path.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::value::Value;

/// Key prefix of a WHERE/ON filter value.
pub const FILTER_PREFIX: &str = "filter_v";
/// Key prefix of a SET value.
pub const FIELD_PREFIX: &str = "field_v";
/// Key prefix of a HAVING value.
pub const HAVING_PREFIX: &str = "filter_h";

/// The two independent key spaces of a compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Values assigned by UPDATE SET clauses.
    Field,
    /// Values compared in WHERE, ON and HAVING clauses.
    Filter,
}

impl Namespace {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bound values of one compiled statement.
///
/// `positional` is only filled for hand-written SQL rewritten by
/// [`rewrite_positional`](crate::query::raw::rewrite_positional).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params {
    pub field: BTreeMap<String, Value>,
    pub filter: BTreeMap<String, Value>,
    pub positional: Vec<Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` in the given namespace.
    pub fn insert(&mut self, namespace: Namespace, key: String, value: Value) {
        match namespace {
            Namespace::Field => self.field.insert(key, value),
            Namespace::Filter => self.filter.insert(key, value),
        };
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<&Value> {
        match namespace {
            Namespace::Field => self.field.get(key),
            Namespace::Filter => self.filter.get(key),
        }
    }

    /// Total number of bound values across all namespaces.
    pub fn len(&self) -> usize {
        self.field.len() + self.filter.len() + self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The structural position of a condition tree inside a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexPath(String);

impl IndexPath {
    /// The path of the `n`th statement of a compilation (0 unless batching).
    pub fn root(n: usize) -> Self {
        Self(n.to_string())
    }

    /// Extends the path by one tagged segment, e.g. `tl` or `ofl2`.
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        Self(format!("{}_{segment}", self.0))
    }

    /// The parameter key of the `index`th value bound at this path.
    pub fn key(&self, prefix: &str, index: usize) -> String {
        format!("{prefix}{}_{index}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The named placeholder for `key` in `namespace`.
pub fn placeholder(root: &str, namespace: Namespace, key: &str) -> String {
    format!("#{{{root}.{namespace}.{key}}}")
}

/// The key of the `n`th element of an expanded IN list.
pub fn item_key(key: &str, n: usize) -> String {
    format!("{key}_{n}")
}
