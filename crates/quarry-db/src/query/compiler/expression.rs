//! SELECT, GROUP BY, HAVING and ORDER BY rendering.

use quarry_core::QuarryResult;

use super::params::{IndexPath, Namespace, HAVING_PREFIX};
use super::resolver::{qualify, resolve_column, resolve_expression, resolve_field};
use super::{Pass, Scope};
use crate::query::provider::{
    Aggregate, ColumnSpec, GroupSpec, HavingFunc, HavingSpec, OrderFunc, OrderSpec, QueryProvider,
};

fn with_alias(expr: String, alias: Option<&str>) -> String {
    match alias {
        Some(alias) if !alias.is_empty() => format!("{expr} AS {alias}"),
        _ => expr,
    }
}

/// Renders one SELECT list entry.
pub(crate) fn select_column(pass: &mut Pass<'_>, scope: &Scope<'_>, spec: &ColumnSpec) -> QuarryResult<String> {
    let alias = spec.alias.as_deref();
    let dialect = pass.dialect;
    Ok(match &spec.func {
        Aggregate::Plain => {
            let resolved = resolve_column(pass, scope, &spec.field)?;
            let alias = alias.unwrap_or(&resolved.field);
            if alias == resolved.column {
                resolved.sql
            } else {
                format!("{} AS {alias}", resolved.sql)
            }
        }
        Aggregate::Count if spec.field.is_empty() => with_alias("count(1)".to_string(), alias),
        Aggregate::Count => {
            let expr = resolve_expression(pass, scope, &spec.field)?;
            with_alias(format!("count(distinct {expr})"), alias)
        }
        Aggregate::Sum => {
            let expr = resolve_expression(pass, scope, &spec.field)?;
            with_alias(format!("sum({})", dialect.null_default(&expr)), alias)
        }
        Aggregate::Avg => {
            let expr = resolve_expression(pass, scope, &spec.field)?;
            with_alias(format!("avg({})", dialect.null_default(&expr)), alias)
        }
        Aggregate::Max => {
            let expr = resolve_expression(pass, scope, &spec.field)?;
            with_alias(format!("max({expr})"), alias)
        }
        Aggregate::Min => {
            let expr = resolve_expression(pass, scope, &spec.field)?;
            with_alias(format!("min({expr})"), alias)
        }
        Aggregate::Distinct => {
            let expr = resolve_expression(pass, scope, &spec.field)?;
            with_alias(format!("distinct({expr})"), alias)
        }
        Aggregate::DateFormat(pattern) => {
            let column = resolve_field(pass, scope, &spec.field)?;
            with_alias(dialect.date_format(&column, pattern), alias)
        }
        Aggregate::Expression => with_alias(resolve_expression(pass, scope, &spec.field)?, alias),
    })
}

/// Whether a column spec was dropped with [`QueryProvider::remove`].
fn is_removed(provider: &QueryProvider, scope: &Scope<'_>, spec: &ColumnSpec) -> bool {
    let removed = &provider.removed;
    if removed.is_empty() {
        return false;
    }
    spec.alias.as_ref().is_some_and(|a| removed.contains(a))
        || removed.contains(&spec.field)
        || scope
            .meta
            .column_of(&spec.field)
            .is_some_and(|c| removed.contains(c))
}

/// Renders the explicitly requested columns of a provider.
pub(crate) fn explicit_columns(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    provider: &QueryProvider,
) -> QuarryResult<Vec<String>> {
    if provider.select_nothing {
        return Ok(Vec::new());
    }
    let mut columns = Vec::with_capacity(provider.columns.len());
    for spec in &provider.columns {
        if !is_removed(provider, scope, spec) {
            columns.push(select_column(pass, scope, spec)?);
        }
    }
    Ok(columns)
}

/// Renders every schema column of the scope's table, aliased to its logical
/// field where the two names differ.
pub(crate) fn all_columns(scope: &Scope<'_>, provider: &QueryProvider) -> Vec<String> {
    tracing::debug!(table = scope.table, "selecting every schema column");
    scope
        .meta
        .columns()
        .filter(|(field, column)| {
            !provider.removed.contains(*field) && !provider.removed.contains(*column)
        })
        .map(|(field, column)| {
            let qualified = qualify(scope.alias.as_deref(), column);
            if field == column {
                qualified
            } else {
                format!("{qualified} AS {field}")
            }
        })
        .collect()
}

/// Renders the SELECT list of a root, subquery or union branch: the explicit
/// columns, or every schema column when none were requested.
pub(crate) fn select_columns(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    provider: &QueryProvider,
) -> QuarryResult<Vec<String>> {
    if provider.columns.is_empty() && !provider.select_nothing {
        return Ok(all_columns(scope, provider));
    }
    explicit_columns(pass, scope, provider)
}

pub(crate) fn group_item(pass: &mut Pass<'_>, scope: &Scope<'_>, spec: &GroupSpec) -> QuarryResult<String> {
    let column = resolve_field(pass, scope, &spec.field)?;
    Ok(match &spec.format {
        Some(pattern) => pass.dialect.date_format(&column, pattern),
        None => column,
    })
}

/// Renders one HAVING clause, binding its value under `filter_h<path>_<index>`.
pub(crate) fn having_item(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    spec: &HavingSpec,
    path: &IndexPath,
    index: usize,
) -> QuarryResult<String> {
    let lhs = match spec.func {
        HavingFunc::Count if spec.field.is_empty() => "count(1)".to_string(),
        HavingFunc::Count => format!("count({})", resolve_expression(pass, scope, &spec.field)?),
        HavingFunc::Plain => resolve_expression(pass, scope, &spec.field)?,
    };
    let placeholder = pass.bind(
        Namespace::Filter,
        path.key(HAVING_PREFIX, index),
        spec.value.clone(),
    );
    Ok(format!("{lhs} {} {placeholder}", spec.cmp.as_sql()))
}

pub(crate) fn order_item(pass: &mut Pass<'_>, scope: &Scope<'_>, spec: &OrderSpec) -> QuarryResult<String> {
    let dialect = pass.dialect;
    let expr = match spec.func {
        OrderFunc::Plain => resolve_field(pass, scope, &spec.field)?,
        OrderFunc::Sum => format!("sum({})", dialect.null_default(&resolve_field(pass, scope, &spec.field)?)),
        OrderFunc::Avg => format!("avg({})", dialect.null_default(&resolve_field(pass, scope, &spec.field)?)),
        OrderFunc::Distinct => format!("distinct({})", resolve_field(pass, scope, &spec.field)?),
        OrderFunc::Expression => resolve_expression(pass, scope, &spec.field)?,
    };
    Ok(format!("{expr} {}", spec.direction.as_sql()))
}
