//! Condition tree compilation.
//!
//! [`compile_group`] renders the leaves of a [`ConditionGroup`] in declaration
//! order, then each nested group in parentheses. The first leaf carries no
//! connector; every later leaf or group is prefixed with its own.

use std::fmt::Write;

use quarry_core::{QuarryError, QuarryResult};

use super::params::{item_key, IndexPath, Namespace, FILTER_PREFIX};
use super::resolver::{resolve_expression, resolve_field};
use super::{render_select, Pass, Scope};
use crate::query::lookups::{Comparison, Condition, ConditionGroup, Filter};
use crate::query::provider::QueryProvider;
use crate::value::Value;

/// Which clause a condition tree is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClauseMode {
    /// A WHERE clause, or a fragment ANDed into one.
    Where,
    /// Extra conditions of a JOIN's ON clause. A nested group that is the
    /// first thing rendered keeps its connector so the fragment can be
    /// appended directly behind the join keys.
    On,
}

pub(crate) fn compile_group(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    group: &ConditionGroup,
    path: &IndexPath,
    mode: ClauseMode,
) -> QuarryResult<String> {
    let mut sql = String::new();

    for (i, condition) in group.conditions.iter().enumerate() {
        let leaf = compile_leaf(pass, scope, condition, path, i)?;
        if i > 0 {
            sql.push_str(condition.connector.as_sql());
        }
        sql.push_str(&leaf);
    }

    for (j, (sub, connector)) in group.groups.iter().enumerate() {
        let inner = compile_group(pass, scope, sub, &path.child(format_args!("ot{j}")), ClauseMode::Where)?;
        if inner.is_empty() {
            continue;
        }
        if !sql.is_empty() || mode == ClauseMode::On {
            sql.push_str(connector.as_sql());
        }
        let _ = write!(sql, "({inner})");
    }

    Ok(sql)
}

/// Resolves the left-hand side of a comparison. Equality goes through the
/// strict field path; ordering comparisons accept arithmetic.
fn comparison_lhs(pass: &mut Pass<'_>, scope: &Scope<'_>, field: &str, cmp: Comparison) -> QuarryResult<String> {
    match cmp {
        Comparison::Equal | Comparison::NotEqual => resolve_field(pass, scope, field),
        _ => resolve_expression(pass, scope, field),
    }
}

fn compile_leaf(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    condition: &Condition,
    path: &IndexPath,
    index: usize,
) -> QuarryResult<String> {
    let field = condition.field.as_str();
    let key = path.key(FILTER_PREFIX, index);

    match &condition.filter {
        Filter::Compare(cmp, value) => {
            let lhs = comparison_lhs(pass, scope, field, *cmp)?;
            let placeholder = pass.bind(Namespace::Filter, key, value.clone());
            Ok(format!("{lhs} {} {placeholder}", cmp.as_sql()))
        }
        Filter::CompareField(cmp, other) => {
            let lhs = resolve_expression(pass, scope, field)?;
            let rhs = resolve_expression(pass, scope, other)?;
            Ok(format!("{lhs} {} {rhs}", cmp.as_sql()))
        }
        Filter::CompareDateFormat { cmp, pattern, value } => {
            let column = resolve_field(pass, scope, field)?;
            let lhs = pass.dialect.date_format(&column, pattern);
            let placeholder = pass.bind(Namespace::Filter, key, value.clone());
            Ok(format!("{lhs} {} {placeholder}", cmp.as_sql()))
        }
        Filter::Like(kind, value) => {
            if value.is_null() {
                return Err(QuarryError::InvalidProvider(format!(
                    "like on '{field}' requires a non-null value"
                )));
            }
            let lhs = resolve_field(pass, scope, field)?;
            let pattern = pass.dialect.like_pattern(*kind, value);
            let placeholder = pass.bind(Namespace::Filter, key, pattern);
            Ok(format!("{lhs} like {placeholder}"))
        }
        Filter::In(value) => compile_in(pass, scope, field, value, &key, "in"),
        Filter::NotIn(value) => compile_in(pass, scope, field, value, &key, "not in"),
        Filter::InQuery(query) => compile_in_query(pass, scope, field, query, path, index, "in"),
        Filter::NotInQuery(query) => compile_in_query(pass, scope, field, query, path, index, "not in"),
        Filter::Guard(kind, value) => {
            let (sign, op) = kind.parts();
            let lhs = resolve_expression(pass, scope, field)?;
            let placeholder = pass.bind(Namespace::Filter, key, value.clone());
            Ok(format!("{lhs} {sign} {placeholder} {op} 0"))
        }
        Filter::IsNull => Ok(format!("{} is null", resolve_expression(pass, scope, field)?)),
        Filter::IsNotNull => Ok(format!("{} is not null", resolve_expression(pass, scope, field)?)),
    }
}

fn compile_in(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    field: &str,
    value: &Value,
    key: &str,
    op: &str,
) -> QuarryResult<String> {
    let items = value
        .in_items()
        .map_err(|e| QuarryError::InvalidInValue(format!("'{field}' {op}: {e}")))?;
    if items.is_empty() {
        return Err(QuarryError::InvalidInValue(format!(
            "'{field}' {op} requires at least one value"
        )));
    }
    let lhs = resolve_field(pass, scope, field)?;
    let placeholders: Vec<String> = items
        .into_iter()
        .enumerate()
        .map(|(n, item)| pass.bind(Namespace::Filter, item_key(key, n), item))
        .collect();
    Ok(format!("{lhs} {op} ({})", placeholders.join(", ")))
}

fn compile_in_query(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    field: &str,
    query: &QueryProvider,
    path: &IndexPath,
    index: usize,
    op: &str,
) -> QuarryResult<String> {
    let table = query.table.as_deref().ok_or_else(|| {
        QuarryError::InvalidSubquery(format!("subquery for '{field}' {op} has no table"))
    })?;
    let lhs = resolve_field(pass, scope, field)?;
    let subquery = render_select(pass, query, table, &path.child(format_args!("s{index}")))?;
    Ok(format!("{lhs} {op} ({subquery})"))
}
