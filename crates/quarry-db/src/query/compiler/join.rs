//! LEFT JOIN compilation.
//!
//! Each join contributes three things to the outer statement:
//!
//! - its `LEFT JOIN <table> <alias> ON (...)` text, where the ON clause holds
//!   the join keys followed by the join's own on-conditions;
//! - the WHERE-scoped conditions declared on the joined provider, collected
//!   into [`Collected::where_side`] so LEFT JOIN semantics are preserved;
//! - its columns, groups, havings and orders, merged into the single flat
//!   SELECT list of the outer statement.
//!
//! Joins nested inside a joined provider are compiled recursively, right
//! after their parent.

use std::fmt::Write;

use quarry_core::{QuarryError, QuarryResult};

use super::expression::{explicit_columns, group_item, having_item, order_item};
use super::filter::{compile_group, ClauseMode};
use super::params::IndexPath;
use super::resolver::{qualify, resolve_expression};
use super::{Pass, Scope};
use crate::query::provider::{Join, JoinKeys};

/// Which parts of the joined providers the caller wants merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Collect {
    pub(crate) columns: bool,
    pub(crate) groups: bool,
    pub(crate) havings: bool,
    pub(crate) orders: bool,
}

impl Collect {
    /// Everything a SELECT needs.
    pub(crate) const ALL: Self = Self {
        columns: true,
        groups: true,
        havings: true,
        orders: true,
    };

    /// Only what changes the row count: groups and havings.
    pub(crate) const COUNT: Self = Self {
        columns: false,
        groups: true,
        havings: true,
        orders: false,
    };

    /// Only the JOIN text and WHERE-scoped conditions, as an UPDATE needs.
    pub(crate) const NONE: Self = Self {
        columns: false,
        groups: false,
        havings: false,
        orders: false,
    };
}

/// Fragments accumulated across a statement and all of its joins.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub(crate) columns: Vec<String>,
    pub(crate) groups: Vec<String>,
    pub(crate) havings: Vec<String>,
    pub(crate) orders: Vec<String>,
    /// WHERE-scoped conditions of joined tables, ANDed into the outer WHERE.
    pub(crate) where_side: Vec<String>,
}

/// Compiles `joins` against the `parent` table, returning the JOIN text.
pub(crate) fn compile_joins(
    pass: &mut Pass<'_>,
    parent: &Scope<'_>,
    joins: &[Join],
    path: &IndexPath,
    collect: Collect,
    out: &mut Collected,
) -> QuarryResult<String> {
    let mut sql = String::new();
    let schema = pass.schema;

    for (l, join) in joins.iter().enumerate() {
        let provider = &join.provider;
        let table = provider.table.as_deref().ok_or_else(|| {
            QuarryError::InvalidProvider(format!(
                "join #{l} from '{}' has no table",
                parent.table
            ))
        })?;
        let scope = Scope {
            table,
            alias: Some(pass.cache.alias(&provider.token)),
            meta: schema.table(table)?,
        };

        let mut on = join_keys(pass, parent, &scope, &join.keys)?;

        if collect.columns && !provider.columns.is_empty() {
            out.columns.extend(explicit_columns(pass, &scope, provider)?);
        }
        if collect.groups {
            for group in &provider.groups {
                out.groups.push(group_item(pass, &scope, group)?);
            }
        }
        if collect.havings {
            let having_path = path.child(format_args!("gh{l}"));
            for (i, having) in provider.havings.iter().enumerate() {
                out.havings.push(having_item(pass, &scope, having, &having_path, i)?);
            }
        }
        if collect.orders {
            for order in &provider.orders {
                out.orders.push(order_item(pass, &scope, order)?);
            }
        }

        let on_filters = compile_group(
            pass,
            &scope,
            &join.on,
            &path.child(format_args!("ofl{l}")),
            ClauseMode::On,
        )?;
        append_on(&mut on, &on_filters);

        let ordinary = compile_group(
            pass,
            &scope,
            &provider.conditions,
            &path.child(format_args!("fl{l}")),
            ClauseMode::Where,
        )?;
        if !ordinary.is_empty() {
            out.where_side.push(ordinary);
        }

        let _ = write!(
            sql,
            " LEFT JOIN {table} {} ON ({on})",
            scope.alias.as_deref().unwrap_or_default()
        );

        if !provider.joins.is_empty() {
            let nested = compile_joins(
                pass,
                &scope,
                &provider.joins,
                &path.child(format_args!("j{l}")),
                collect,
                out,
            )?;
            sql.push_str(&nested);
        }
    }

    Ok(sql)
}

fn join_keys(pass: &mut Pass<'_>, parent: &Scope<'_>, joined: &Scope<'_>, keys: &JoinKeys) -> QuarryResult<String> {
    match keys {
        JoinKeys::Single { left, right } => Ok(format!(
            "{} = {}",
            qualify(parent.alias.as_deref(), left),
            qualify(joined.alias.as_deref(), right)
        )),
        JoinKeys::Composite(pairs) => {
            if pairs.is_empty() {
                return Err(QuarryError::InvalidProvider(format!(
                    "join to '{}' has no key pairs",
                    joined.table
                )));
            }
            let mut parts = Vec::with_capacity(pairs.len());
            for (left, right) in pairs {
                let lhs = resolve_expression(pass, parent, left)?;
                let rhs = resolve_expression(pass, joined, right)?;
                parts.push(format!("{lhs} = {rhs}"));
            }
            Ok(parts.join(" AND "))
        }
    }
}

/// Splices on-conditions behind the join keys. A fragment that already opens
/// with a connector keeps it; anything else is ANDed.
fn append_on(on: &mut String, fragment: &str) {
    let trimmed = fragment.trim_start();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.starts_with("AND ") || trimmed.starts_with("OR ") {
        on.push(' ');
    } else {
        on.push_str(" AND ");
    }
    on.push_str(trimmed);
}

/// Returns `true` when `sql` contains an `OR` outside any parentheses.
fn has_top_level_or(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut depth = 0_i32;
    let mut quoted = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth -= 1,
            b' ' if !quoted && depth == 0 => {
                if bytes[i + 1..].starts_with(b"OR ") {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// ANDs WHERE fragments together, parenthesizing any fragment whose own
/// top-level connector is `OR`.
pub(crate) fn combine_where(parts: impl IntoIterator<Item = String>) -> String {
    let parts: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return parts.into_iter().next().unwrap_or_default();
    }
    parts
        .into_iter()
        .map(|p| if has_top_level_or(&p) { format!("({p})") } else { p })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compiler::SqlCompiler;
    use crate::query::lookups::{Comparison, ConditionGroup, Filterable};
    use crate::query::provider::{HavingFunc, QueryProvider};
    use crate::schema::SchemaRegistry;

    fn schema() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_table("order", [("id", "id"), ("userId", "user_id"), ("amount", "amount")])
            .with_table("user", [("id", "id"), ("userName", "user_name"), ("age", "age"), ("cityId", "city_id")])
            .with_table("city", [("id", "id"), ("name", "name")])
    }

    fn compile(joins: &[Join], collect: Collect) -> QuarryResult<(String, Collected, usize)> {
        let schema = schema();
        let compiler = SqlCompiler::new(&schema);
        let mut pass = compiler.pass();
        let parent = Scope {
            table: "order",
            alias: Some(pass.cache.alias("root")),
            meta: schema.table("order")?,
        };
        let mut out = Collected::default();
        let sql = compile_joins(&mut pass, &parent, joins, &IndexPath::root(0).child("cl"), collect, &mut out)?;
        Ok((sql, out, pass.params.len()))
    }

    #[test]
    fn test_single_key_join() {
        let join = Join::new("user_id", "id", QueryProvider::for_table("user"));
        let (sql, out, _) = compile(&[join], Collect::ALL).unwrap();
        assert_eq!(sql, " LEFT JOIN user t1 ON (t0.user_id = t1.id)");
        assert!(out.where_side.is_empty());
        assert!(out.columns.is_empty());
    }

    #[test]
    fn test_on_filters_and_where_side() {
        let user = QueryProvider::for_table("user").greater_than("age", 18);
        let join = Join::new("user_id", "id", user).equal("userName", "bob");
        let (sql, out, params) = compile(&[join], Collect::ALL).unwrap();
        assert_eq!(
            sql,
            " LEFT JOIN user t1 ON (t0.user_id = t1.id AND t1.user_name = #{request.filter.filter_v0_cl_ofl0_0})"
        );
        assert_eq!(out.where_side, vec!["t1.age > #{request.filter.filter_v0_cl_fl0_0}"]);
        assert_eq!(params, 2);
    }

    #[test]
    fn test_on_group_keeps_its_connector() {
        let group = ConditionGroup::new().equal("age", 1).or_equal("age", 2);
        let join = Join::new("user_id", "id", QueryProvider::for_table("user")).or_group(group);
        let (sql, _, _) = compile(&[join], Collect::ALL).unwrap();
        assert_eq!(
            sql,
            " LEFT JOIN user t1 ON (t0.user_id = t1.id OR (t1.age = #{request.filter.filter_v0_cl_ofl0_ot0_0} \
             OR t1.age = #{request.filter.filter_v0_cl_ofl0_ot0_1}))"
        );
    }

    #[test]
    fn test_composite_keys_resolve_fields() {
        let join = Join::composite(
            [("userId", "id"), ("amount", "age + 1")],
            QueryProvider::for_table("user"),
        );
        let (sql, _, _) = compile(&[join], Collect::ALL).unwrap();
        assert_eq!(
            sql,
            " LEFT JOIN user t1 ON (t0.user_id = t1.id AND t0.amount = t1.age + 1)"
        );
    }

    #[test]
    fn test_collects_columns_groups_havings_orders() {
        let user = QueryProvider::for_table("user")
            .select("userName")
            .group_by("age")
            .having("id", HavingFunc::Count, Comparison::GreaterThan, 1)
            .order_desc("age");
        let join = Join::new("user_id", "id", user);
        let (_, out, params) = compile(&[join], Collect::ALL).unwrap();
        assert_eq!(out.columns, vec!["t1.user_name AS userName"]);
        assert_eq!(out.groups, vec!["t1.age"]);
        assert_eq!(out.havings, vec!["count(t1.id) > #{request.filter.filter_h0_cl_gh0_0}"]);
        assert_eq!(out.orders, vec!["t1.age DESC"]);
        assert_eq!(params, 1);
    }

    #[test]
    fn test_count_collect_skips_columns_and_orders() {
        let user = QueryProvider::for_table("user").select("userName").group_by("age").order_asc("age");
        let (_, out, _) = compile(&[Join::new("user_id", "id", user)], Collect::COUNT).unwrap();
        assert!(out.columns.is_empty());
        assert!(out.orders.is_empty());
        assert_eq!(out.groups, vec!["t1.age"]);
    }

    #[test]
    fn test_nested_joins() {
        let city = QueryProvider::for_table("city").select_as("name", "cityName").equal("name", "Oslo");
        let user = QueryProvider::for_table("user").left_join(Join::new("city_id", "id", city));
        let (sql, out, _) = compile(&[Join::new("user_id", "id", user)], Collect::ALL).unwrap();
        assert_eq!(
            sql,
            " LEFT JOIN user t1 ON (t0.user_id = t1.id) LEFT JOIN city t2 ON (t1.city_id = t2.id)"
        );
        assert_eq!(out.columns, vec!["t2.name AS cityName"]);
        assert_eq!(
            out.where_side,
            vec!["t2.name = #{request.filter.filter_v0_cl_j0_fl0_0}"]
        );
    }

    #[test]
    fn test_join_without_table() {
        let join = Join::new("user_id", "id", QueryProvider::new());
        assert!(matches!(
            compile(&[join], Collect::ALL),
            Err(QuarryError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_join_unknown_table() {
        let join = Join::new("user_id", "id", QueryProvider::for_table("nope"));
        assert!(matches!(
            compile(&[join], Collect::ALL),
            Err(QuarryError::UnknownTable(_))
        ));
    }

    // ── WHERE combination ───────────────────────────────────────────

    #[test]
    fn test_top_level_or_detection() {
        assert!(has_top_level_or("a = 1 OR b = 2"));
        assert!(!has_top_level_or("a = 1 AND (b = 2 OR c = 3)"));
        assert!(!has_top_level_or("a = 'x OR y'"));
        assert!(!has_top_level_or("color = 1"));
    }

    #[test]
    fn test_combine_where() {
        assert_eq!(combine_where(Vec::<String>::new()), "");
        assert_eq!(combine_where(vec!["a OR b".to_string()]), "a OR b");
        assert_eq!(
            combine_where(vec!["a OR b".to_string(), String::new(), "c".to_string()]),
            "(a OR b) AND c"
        );
    }
}
