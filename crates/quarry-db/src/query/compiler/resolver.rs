//! Logical field to physical column resolution.
//!
//! Two entry points mirror the two ways a field can be written:
//!
//! - [`resolve_field`] takes a single field name. The name must be a logical
//!   field or a physical column of the current table, or a cross-branch
//!   reference `#tas_<token>.<field>`; anything else is an
//!   [`UnknownField`](QuarryError::UnknownField).
//! - [`resolve_expression`] takes arithmetic such as `price * (1 - discount)`.
//!   It splits on `+ - * / ( ) ,` and spaces, resolves every token that names a
//!   column and copies every other token (numbers, function names) verbatim.

use quarry_core::{QuarryError, QuarryResult};

use super::{Pass, Scope};
use crate::query::provider::TABLE_REF_PREFIX;
use crate::schema::TableMeta;

/// A field resolved to its qualified column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedColumn {
    /// `alias.column`, or the bare column when the scope has no alias.
    pub(crate) sql: String,
    pub(crate) column: String,
    /// The logical field name exposed for `column`.
    pub(crate) field: String,
}

/// Splits `#tas_<token>.<field>` into `(token, field)`.
pub(crate) fn parse_ref(name: &str) -> Option<(&str, &str)> {
    name.strip_prefix(TABLE_REF_PREFIX)?.split_once('.')
}

pub(crate) fn qualify(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{alias}.{column}"),
        None => column.to_string(),
    }
}

/// The physical column for a logical field, or the name itself when it is
/// already a column of the table.
fn physical<'m>(meta: &'m TableMeta, name: &'m str) -> Option<&'m str> {
    meta.column_of(name)
        .or_else(|| meta.has_column(name).then_some(name))
}

fn unknown(field: &str, table: &str) -> QuarryError {
    QuarryError::UnknownField(format!("'{field}' is not a field of table '{table}'"))
}

pub(crate) fn resolve_column(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    name: &str,
) -> QuarryResult<ResolvedColumn> {
    if let Some((token, field)) = parse_ref(name) {
        let table = pass.tables.get(token).cloned().ok_or_else(|| {
            QuarryError::UnknownField(format!(
                "'{name}' refers to table token {token}, which is not part of this statement"
            ))
        })?;
        let schema = pass.schema;
        let meta = schema.table(&table)?;
        let column = physical(meta, field).ok_or_else(|| unknown(field, &table))?;
        let alias = pass.cache.alias(token);
        return Ok(ResolvedColumn {
            sql: qualify(Some(&alias), column),
            field: meta.field_of(column).unwrap_or(field).to_string(),
            column: column.to_string(),
        });
    }

    let column = physical(scope.meta, name).ok_or_else(|| unknown(name, scope.table))?;
    Ok(ResolvedColumn {
        sql: qualify(scope.alias.as_deref(), column),
        field: scope.meta.field_of(column).unwrap_or(name).to_string(),
        column: column.to_string(),
    })
}

/// Resolves a single field to its qualified column.
pub(crate) fn resolve_field(pass: &mut Pass<'_>, scope: &Scope<'_>, name: &str) -> QuarryResult<String> {
    Ok(resolve_column(pass, scope, name)?.sql)
}

const fn is_delimiter(ch: char) -> bool {
    matches!(ch, '+' | '-' | '*' | '/' | '(' | ')' | ',' | ' ')
}

/// Resolves every column token of an arithmetic expression in place.
pub(crate) fn resolve_expression(
    pass: &mut Pass<'_>,
    scope: &Scope<'_>,
    expr: &str,
) -> QuarryResult<String> {
    let mut out = String::with_capacity(expr.len() + 8);
    let mut start = 0;
    for (i, ch) in expr.char_indices() {
        if is_delimiter(ch) {
            resolve_token(pass, scope, &expr[start..i], &mut out)?;
            out.push(ch);
            start = i + ch.len_utf8();
        }
    }
    resolve_token(pass, scope, &expr[start..], &mut out)?;
    Ok(out)
}

fn resolve_token(pass: &mut Pass<'_>, scope: &Scope<'_>, token: &str, out: &mut String) -> QuarryResult<()> {
    if token.is_empty() {
        return Ok(());
    }
    if token.starts_with(TABLE_REF_PREFIX) {
        out.push_str(&resolve_field(pass, scope, token)?);
    } else if let Some(column) = physical(scope.meta, token) {
        out.push_str(&qualify(scope.alias.as_deref(), column));
    } else {
        out.push_str(token);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compiler::SqlCompiler;
    use crate::schema::SchemaRegistry;

    fn schema() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_table(
                "item",
                [("id", "id"), ("price", "price"), ("quantity", "qty"), ("discount", "discount")],
            )
            .with_table("user", [("id", "id"), ("userName", "user_name")])
    }

    fn with_scope<R>(f: impl FnOnce(&mut Pass<'_>, &Scope<'_>) -> R) -> R {
        let schema = schema();
        let compiler = SqlCompiler::new(&schema);
        let mut pass = compiler.pass();
        pass.tables.insert("99".into(), "user".into());
        let scope = Scope {
            table: "item",
            alias: Some(pass.cache.alias("1")),
            meta: schema.table("item").unwrap(),
        };
        f(&mut pass, &scope)
    }

    #[test]
    fn test_parse_ref() {
        assert_eq!(parse_ref("#tas_12.userName"), Some(("12", "userName")));
        assert_eq!(parse_ref("userName"), None);
        assert_eq!(parse_ref("#tas_12"), None);
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(Some("t0"), "id"), "t0.id");
        assert_eq!(qualify(None, "id"), "id");
    }

    #[test]
    fn test_resolve_logical_and_physical() {
        with_scope(|pass, scope| {
            assert_eq!(resolve_field(pass, scope, "quantity").unwrap(), "t0.qty");
            assert_eq!(resolve_field(pass, scope, "qty").unwrap(), "t0.qty");
            let col = resolve_column(pass, scope, "qty").unwrap();
            assert_eq!(col.field, "quantity");
            assert_eq!(col.column, "qty");
        });
    }

    #[test]
    fn test_resolve_unknown_field() {
        with_scope(|pass, scope| {
            let err = resolve_field(pass, scope, "missing").unwrap_err();
            assert!(matches!(err, QuarryError::UnknownField(ref m) if m.contains("missing")));
        });
    }

    #[test]
    fn test_resolve_cross_branch_reference() {
        with_scope(|pass, scope| {
            assert_eq!(resolve_field(pass, scope, "#tas_99.userName").unwrap(), "t1.user_name");
            // The alias is stable once minted.
            assert_eq!(resolve_field(pass, scope, "#tas_99.id").unwrap(), "t1.id");
            assert!(matches!(
                resolve_field(pass, scope, "#tas_5.id"),
                Err(QuarryError::UnknownField(_))
            ));
            assert!(matches!(
                resolve_field(pass, scope, "#tas_99.nope"),
                Err(QuarryError::UnknownField(_))
            ));
        });
    }

    #[test]
    fn test_resolve_expression() {
        with_scope(|pass, scope| {
            assert_eq!(
                resolve_expression(pass, scope, "price*quantity").unwrap(),
                "t0.price*t0.qty"
            );
            assert_eq!(
                resolve_expression(pass, scope, "price * (1 - discount)").unwrap(),
                "t0.price * (1 - t0.discount)"
            );
            assert_eq!(
                resolve_expression(pass, scope, "sum(price)").unwrap(),
                "sum(t0.price)"
            );
        });
    }

    #[test]
    fn test_resolve_expression_keeps_unknown_tokens() {
        with_scope(|pass, scope| {
            assert_eq!(
                resolve_expression(pass, scope, "round(price,2)").unwrap(),
                "round(t0.price,2)"
            );
            assert_eq!(resolve_expression(pass, scope, "").unwrap(), "");
        });
    }

    #[test]
    fn test_resolve_without_alias() {
        let schema = schema();
        let compiler = SqlCompiler::new(&schema);
        let mut pass = compiler.pass();
        let scope = Scope {
            table: "item",
            alias: None,
            meta: schema.table("item").unwrap(),
        };
        assert_eq!(resolve_field(&mut pass, &scope, "quantity").unwrap(), "qty");
        assert_eq!(resolve_expression(&mut pass, &scope, "price+1").unwrap(), "price+1");
    }
}
