//! Hand-written SQL.
//!
//! Raw statements use `?` markers. [`rewrite_positional`] turns them into the
//! named placeholder form the compiler emits, so both kinds of statement can
//! go through the same executor.

use crate::query::compiler::{placeholder, IndexPath, Namespace, Params, Statement, FILTER_PREFIX};
use crate::schema::TableMeta;
use crate::value::Value;

/// Rewrites each `?` outside a quoted literal to `#{<root>[i]}`, counting
/// from 0 left to right.
///
/// # Examples
///
/// ```
/// use quarry_db::query::raw::rewrite_positional;
///
/// assert_eq!(
///     rewrite_positional("SELECT * FROM user WHERE age > ? AND name = '?' AND id = ?", "request"),
///     "SELECT * FROM user WHERE age > #{request[0]} AND name = '?' AND id = #{request[1]}"
/// );
/// ```
pub fn rewrite_positional(sql: &str, root: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut index = 0;
    let mut quoted = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                quoted = !quoted;
                out.push(ch);
            }
            '?' if !quoted => {
                out.push_str(&format!("#{{{root}[{index}]}}"));
                index += 1;
            }
            _ => out.push(ch),
        }
    }
    out
}

/// A hand-written statement and its positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl RawStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Rewrites the markers and moves the values into `Params::positional`.
    pub fn into_statement(self, root: &str) -> Statement {
        Statement {
            sql: rewrite_positional(&self.sql, root),
            params: Params {
                positional: self.params,
                ..Params::default()
            },
        }
    }
}

fn bind_id(root: &str, id: Value) -> (String, Params) {
    let key = IndexPath::root(0).child("id").key(FILTER_PREFIX, 0);
    let marker = placeholder(root, Namespace::Filter, &key);
    let mut params = Params::new();
    params.insert(Namespace::Filter, key, id);
    (marker, params)
}

/// `DELETE FROM <table> WHERE id = #{<root>.filter.filter_v0_id_0}`
pub fn delete_by_id(root: &str, table: &str, id: impl Into<Value>) -> Statement {
    let (marker, params) = bind_id(root, id.into());
    Statement {
        sql: format!("DELETE FROM {table} WHERE id = {marker}"),
        params,
    }
}

/// Selects every column of `table` by id, each aliased to its logical field.
pub fn select_by_id(root: &str, table: &str, meta: &TableMeta, id: impl Into<Value>) -> Statement {
    let columns: Vec<String> = meta
        .columns()
        .map(|(field, column)| {
            if field == column {
                column.to_string()
            } else {
                format!("{column} AS {field}")
            }
        })
        .collect();
    let (marker, params) = bind_id(root, id.into());
    Statement {
        sql: format!("SELECT {} FROM {table} WHERE id = {marker}", columns.join(", ")),
        params,
    }
}
