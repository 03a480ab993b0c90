//! The SQL compiler.
//!
//! [`SqlCompiler`] turns provider trees into parameterized SQL. Every entry
//! point starts a fresh compilation pass with its own [`AliasCache`] and
//! [`Params`]; nothing is cached between calls, so compiling the same provider
//! twice yields the same text and the same bindings.
//!
//! The compiler only reads the [`SchemaRegistry`] it borrows and can be shared
//! freely across threads.
//!
//! # Examples
//!
//! ```
//! use quarry_db::query::compiler::SqlCompiler;
//! use quarry_db::query::lookups::Filterable;
//! use quarry_db::query::provider::QueryProvider;
//! use quarry_db::schema::SchemaRegistry;
//!
//! let schema = SchemaRegistry::new().with_table("user", [("id", "id"), ("age", "age")]);
//! let compiler = SqlCompiler::new(&schema);
//!
//! let query = QueryProvider::new().greater_equal("age", 18).limit(10);
//! let stmt = compiler.compile_select(&query, "user").unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT t0.id, t0.age FROM user t0 WHERE t0.age >= #{request.filter.filter_v0_tl_0} LIMIT 10"
//! );
//! assert_eq!(stmt.params.filter.len(), 1);
//! ```

mod alias;
mod expression;
mod filter;
mod join;
mod params;
mod resolver;

use std::collections::HashMap;
use std::fmt::Write;

use quarry_core::logging::compile_span;
use quarry_core::{QuarryError, QuarryResult, Settings, SETTINGS};

pub use alias::AliasCache;
pub use params::{placeholder, IndexPath, Namespace, Params, FIELD_PREFIX, FILTER_PREFIX, HAVING_PREFIX};

use self::expression::{group_item, having_item, order_item, select_columns};
use self::filter::{compile_group, ClauseMode};
use self::join::{combine_where, compile_joins, Collect, Collected};
use self::resolver::qualify;
use crate::dialect::Dialect;
use crate::query::lookups::ConditionGroup;
use crate::query::provider::{DeleteProvider, InsertProvider, Join, QueryProvider, SetOp, UpdateProvider};
use crate::schema::{SchemaRegistry, TableMeta};
use crate::value::Value;

/// A compiled statement and its bound values.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

/// The two halves of a paginated read.
///
/// The count query and the data query share one parameter map. The data
/// query is only rendered by [`data_sql`](Self::data_sql), so a caller that
/// finds no rows never builds it.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedStatement {
    pub count_sql: String,
    /// The data query without its page window.
    pub base_sql: String,
    pub params: Params,
    pub dialect: Dialect,
}

impl PagedStatement {
    /// Renders the data query for a 1-based page.
    pub fn data_sql(&self, page_number: u64, page_size: u64) -> QuarryResult<String> {
        self.dialect.page_clause(&self.base_sql, page_number, page_size)
    }
}

/// Compiles providers against a schema registry.
#[derive(Debug, Clone)]
pub struct SqlCompiler<'a> {
    schema: &'a SchemaRegistry,
    dialect: Dialect,
    param_root: String,
    log_sql: bool,
}

/// The table a condition tree or column list is resolved against.
#[derive(Debug, Clone)]
pub(crate) struct Scope<'a> {
    pub(crate) table: &'a str,
    /// `None` renders bare column names (DELETE).
    pub(crate) alias: Option<String>,
    pub(crate) meta: &'a TableMeta,
}

/// Mutable state of one compilation pass.
pub(crate) struct Pass<'c> {
    pub(crate) schema: &'c SchemaRegistry,
    pub(crate) dialect: Dialect,
    pub(crate) root: &'c str,
    pub(crate) cache: AliasCache,
    pub(crate) params: Params,
    /// alias token -> table, for `#tas_` references
    pub(crate) tables: HashMap<String, String>,
}

impl Pass<'_> {
    /// Binds `value` and returns its placeholder.
    pub(crate) fn bind(&mut self, namespace: Namespace, key: String, value: Value) -> String {
        let placeholder = placeholder(self.root, namespace, &key);
        self.params.insert(namespace, key, value);
        placeholder
    }

    /// Records one table reference under its alias token.
    ///
    /// Every table reference of a statement needs its own alias, so a token
    /// seen twice (a cloned provider joined again) is rejected.
    fn claim(&mut self, token: &str, table: &str) -> QuarryResult<()> {
        if let Some(previous) = self.tables.insert(token.to_string(), table.to_string()) {
            return Err(QuarryError::InvalidProvider(format!(
                "providers for '{previous}' and '{table}' share alias token {token}; \
                 call reissue_token() on a reused provider"
            )));
        }
        Ok(())
    }

    /// Records the table of every provider reachable from `provider`, so that
    /// a `#tas_` reference can name a branch compiled later in the pass.
    fn register(&mut self, provider: &QueryProvider, table: &str) -> QuarryResult<()> {
        self.claim(&provider.token, table)?;
        self.register_subqueries(&provider.conditions)?;
        self.register_joins(&provider.joins)?;
        for (_, branch) in &provider.unions {
            let t = branch.table.as_deref().unwrap_or(table);
            self.register(branch, t)?;
        }
        Ok(())
    }

    fn register_joins(&mut self, joins: &[Join]) -> QuarryResult<()> {
        for join in joins {
            if let Some(t) = &join.provider.table {
                self.register(&join.provider, t)?;
            }
            self.register_subqueries(&join.on)?;
        }
        Ok(())
    }

    fn register_subqueries(&mut self, conditions: &ConditionGroup) -> QuarryResult<()> {
        for sub in conditions.subqueries() {
            if let Some(t) = &sub.table {
                self.register(sub, t)?;
            }
        }
        Ok(())
    }
}

/// The clauses of one SELECT, kept apart so pagination can reassemble them.
#[derive(Debug)]
struct SelectParts {
    columns: Vec<String>,
    /// `<table> <alias>` followed by any JOINs.
    from: String,
    where_sql: String,
    groups: Vec<String>,
    havings: Vec<String>,
    orders: Vec<String>,
}

impl SelectParts {
    /// Everything from `FROM` through `HAVING`.
    fn body(&self) -> String {
        let mut sql = format!(" FROM {}", self.from);
        if !self.where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_sql);
        }
        if !self.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.groups.join(", "));
        }
        if !self.havings.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.havings.join(" AND "));
        }
        sql
    }

    fn order_clause(&self) -> String {
        if self.orders.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", self.orders.join(", "))
        }
    }

    fn select_sql(&self) -> String {
        format!("SELECT {}{}{}", self.columns.join(", "), self.body(), self.order_clause())
    }
}

/// Compiles the clauses of a SELECT over `table`.
///
/// Aliases are minted in a fixed order: the table itself, then anything its
/// columns, groups, havings and orders reference, then the joins, then the
/// subqueries of its WHERE clause.
fn select_parts(
    pass: &mut Pass<'_>,
    provider: &QueryProvider,
    table: &str,
    path: &IndexPath,
    collect: Collect,
) -> QuarryResult<SelectParts> {
    let schema = pass.schema;
    let scope = Scope {
        table,
        alias: Some(pass.cache.alias(&provider.token)),
        meta: schema.table(table)?,
    };

    let mut out = Collected::default();
    if collect.columns {
        out.columns = select_columns(pass, &scope, provider)?;
    }
    if collect.groups {
        for group in &provider.groups {
            out.groups.push(group_item(pass, &scope, group)?);
        }
    }
    if collect.havings {
        let having_path = path.child("gh");
        for (i, having) in provider.havings.iter().enumerate() {
            out.havings.push(having_item(pass, &scope, having, &having_path, i)?);
        }
    }
    if collect.orders {
        for order in &provider.orders {
            out.orders.push(order_item(pass, &scope, order)?);
        }
    }

    let joins = compile_joins(pass, &scope, &provider.joins, &path.child("cl"), collect, &mut out)?;
    let root_where = compile_group(pass, &scope, &provider.conditions, &path.child("tl"), ClauseMode::Where)?;

    let mut where_parts = Vec::with_capacity(out.where_side.len() + 1);
    where_parts.push(root_where);
    where_parts.append(&mut out.where_side);

    Ok(SelectParts {
        columns: out.columns,
        from: format!("{table} {}{joins}", scope.alias.as_deref().unwrap_or_default()),
        where_sql: combine_where(where_parts),
        groups: out.groups,
        havings: out.havings,
        orders: out.orders,
    })
}

/// Compiles a complete SELECT: columns, joins, clauses, unions and limit.
///
/// Used for the root statement and for `IN (SELECT ...)` subqueries.
pub(crate) fn render_select(
    pass: &mut Pass<'_>,
    provider: &QueryProvider,
    table: &str,
    path: &IndexPath,
) -> QuarryResult<String> {
    let mut sql = render_compound(pass, provider, table, path)?;
    sql.push_str(&pass.dialect.limit_clause(provider.limit));
    Ok(sql)
}

/// A SELECT and its union branches, without the trailing limit.
///
/// When union branches are present every branch is parenthesized so each
/// keeps its own ORDER BY and LIMIT; the root limit applies to the whole
/// union.
fn render_compound(
    pass: &mut Pass<'_>,
    provider: &QueryProvider,
    table: &str,
    path: &IndexPath,
) -> QuarryResult<String> {
    let parts = select_parts(pass, provider, table, path, Collect::ALL)?;
    if parts.columns.is_empty() {
        return Err(QuarryError::EmptyProjection(format!(
            "no columns selected from '{table}'"
        )));
    }

    let mut sql = parts.select_sql();
    if !provider.unions.is_empty() {
        sql = format!("({sql})");
        for (k, (kind, branch)) in provider.unions.iter().enumerate() {
            let branch_table = branch.table.as_deref().unwrap_or(table);
            let branch_parts =
                select_parts(pass, branch, branch_table, &path.child(format_args!("un{k}")), Collect::ALL)?;
            if branch_parts.columns.is_empty() {
                return Err(QuarryError::EmptyProjection(format!(
                    "union branch #{k} selects no columns from '{branch_table}'"
                )));
            }
            let _ = write!(
                sql,
                "{}({}{})",
                kind.as_sql(),
                branch_parts.select_sql(),
                pass.dialect.limit_clause(branch.limit)
            );
        }
    }
    Ok(sql)
}

impl<'a> SqlCompiler<'a> {
    /// Creates a MySQL compiler with the `request` placeholder root.
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self {
            schema,
            dialect: Dialect::default(),
            param_root: "request".to_string(),
            log_sql: false,
        }
    }

    /// Creates a compiler configured from [`Settings`].
    pub fn from_settings(schema: &'a SchemaRegistry, settings: &Settings) -> QuarryResult<Self> {
        Ok(Self {
            schema,
            dialect: settings.dialect.parse()?,
            param_root: settings.param_root.clone(),
            log_sql: settings.log_sql,
        })
    }

    /// Creates a compiler from the global [`SETTINGS`], or with the defaults
    /// when the application never configured them.
    pub fn from_global(schema: &'a SchemaRegistry) -> QuarryResult<Self> {
        match SETTINGS.try_get() {
            Some(settings) => Self::from_settings(schema, settings),
            None => Ok(Self::new(schema)),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_param_root(mut self, root: impl Into<String>) -> Self {
        self.param_root = root.into();
        self
    }

    pub fn with_log_sql(mut self, log_sql: bool) -> Self {
        self.log_sql = log_sql;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn param_root(&self) -> &str {
        &self.param_root
    }

    pub fn schema(&self) -> &'a SchemaRegistry {
        self.schema
    }

    pub(crate) fn pass(&self) -> Pass<'_> {
        Pass {
            schema: self.schema,
            dialect: self.dialect,
            root: &self.param_root,
            cache: AliasCache::new(),
            params: Params::new(),
            tables: HashMap::new(),
        }
    }

    fn log(&self, kind: &str, sql: &str, params: &Params) {
        if self.log_sql {
            tracing::debug!(kind, sql, params = params.len(), "compiled statement");
        }
    }

    fn finish(&self, kind: &str, sql: String, params: Params) -> Statement {
        self.log(kind, &sql, &params);
        Statement { sql, params }
    }

    // ── SELECT ──────────────────────────────────────────────────────

    /// Compiles a SELECT over `table`.
    ///
    /// # Errors
    ///
    /// Fails with [`QuarryError::EmptyProjection`] when no column survives,
    /// [`QuarryError::UnknownField`] for an unresolvable field and
    /// [`QuarryError::UnknownTable`] for a table missing from the schema.
    pub fn compile_select(&self, provider: &QueryProvider, table: &str) -> QuarryResult<Statement> {
        let span = compile_span("select", table);
        let _guard = span.enter();

        let mut pass = self.pass();
        pass.register(provider, table)?;
        let sql = render_select(&mut pass, provider, table, &IndexPath::root(0))?;
        Ok(self.finish("select", sql, pass.params))
    }

    /// Compiles a SELECT limited to one row.
    pub fn compile_find_one(&self, provider: &QueryProvider, table: &str) -> QuarryResult<Statement> {
        let mut single = provider.clone();
        single.limit = Some(1);
        self.compile_select(&single, table)
    }

    /// Compiles the count and data queries of a paginated SELECT.
    ///
    /// The provider's own limit is ignored. A grouped query is counted by
    /// groups: `SELECT count(1) FROM (SELECT count(1) ... GROUP BY ...) s`. A
    /// union is counted as a whole and paged as a whole.
    pub fn compile_page(&self, provider: &QueryProvider, table: &str) -> QuarryResult<PagedStatement> {
        let span = compile_span("page", table);
        let _guard = span.enter();

        let mut pass = self.pass();
        pass.register(provider, table)?;
        if !provider.unions.is_empty() {
            let base_sql = render_compound(&mut pass, provider, table, &IndexPath::root(0))?;
            let count_sql = format!("SELECT count(1) FROM ({base_sql}) s");
            self.log("page.count", &count_sql, &pass.params);
            return Ok(PagedStatement {
                count_sql,
                base_sql,
                params: pass.params,
                dialect: self.dialect,
            });
        }

        let parts = select_parts(&mut pass, provider, table, &IndexPath::root(0), Collect::ALL)?;
        if parts.columns.is_empty() {
            return Err(QuarryError::EmptyProjection(format!(
                "no columns selected from '{table}'"
            )));
        }

        let body = parts.body();
        let count_sql = if parts.groups.is_empty() {
            format!("SELECT count(1){body}")
        } else {
            format!("SELECT count(1) FROM (SELECT count(1){body}) s")
        };
        let base_sql = parts.select_sql();

        self.log("page.count", &count_sql, &pass.params);
        Ok(PagedStatement {
            count_sql,
            base_sql,
            params: pass.params,
            dialect: self.dialect,
        })
    }

    /// Compiles an existence check: `SELECT count(1)` over the same FROM,
    /// WHERE, GROUP BY and HAVING a SELECT would use. A union is counted
    /// through a derived table.
    pub fn compile_validate(&self, provider: &QueryProvider, table: &str) -> QuarryResult<Statement> {
        let span = compile_span("validate", table);
        let _guard = span.enter();

        let mut pass = self.pass();
        pass.register(provider, table)?;
        if !provider.unions.is_empty() {
            let union_sql = render_compound(&mut pass, provider, table, &IndexPath::root(0))?;
            let sql = format!("SELECT count(1) FROM ({union_sql}) s");
            return Ok(self.finish("validate", sql, pass.params));
        }

        let parts = select_parts(&mut pass, provider, table, &IndexPath::root(0), Collect::COUNT)?;
        let sql = format!("SELECT count(1){}", parts.body());
        Ok(self.finish("validate", sql, pass.params))
    }

    // ── INSERT ──────────────────────────────────────────────────────

    /// Compiles a single-row INSERT. Values bind in the `field` namespace.
    ///
    /// # Errors
    ///
    /// Fails with [`QuarryError::InvalidProvider`] when the row has no values
    /// and [`QuarryError::UnknownField`] for a field the table lacks.
    pub fn compile_insert(&self, provider: &InsertProvider, table: &str) -> QuarryResult<Statement> {
        let span = compile_span("insert", table);
        let _guard = span.enter();

        let mut pass = self.pass();
        let sql = insert_sql(&mut pass, std::slice::from_ref(provider), table)?;
        Ok(self.finish("insert", sql, pass.params))
    }

    /// Compiles a multi-row `INSERT ... VALUES (...), (...)`. Every row must
    /// list the same fields in the same order.
    pub fn compile_batch_insert(&self, rows: &[InsertProvider], table: &str) -> QuarryResult<Statement> {
        let span = compile_span("batch_insert", table);
        let _guard = span.enter();

        let mut pass = self.pass();
        let sql = insert_sql(&mut pass, rows, table)?;
        Ok(self.finish("batch_insert", sql, pass.params))
    }

    // ── UPDATE ──────────────────────────────────────────────────────

    /// Compiles an UPDATE.
    ///
    /// # Errors
    ///
    /// Fails with [`QuarryError::InvalidProvider`] when there is nothing to
    /// set, no condition restricts the update, or the dialect cannot express
    /// the requested joins, order or limit.
    pub fn compile_update(&self, provider: &UpdateProvider, table: &str) -> QuarryResult<Statement> {
        let span = compile_span("update", table);
        let _guard = span.enter();

        let mut pass = self.pass();
        let sql = update_sql(&mut pass, provider, table, &IndexPath::root(0))?;
        Ok(self.finish("update", sql, pass.params))
    }

    /// Compiles several UPDATEs into one `;`-separated batch sharing one
    /// parameter map.
    pub fn compile_batch_update(&self, providers: &[UpdateProvider], table: &str) -> QuarryResult<Statement> {
        let span = compile_span("batch_update", table);
        let _guard = span.enter();

        if providers.is_empty() {
            return Err(QuarryError::InvalidProvider(format!(
                "batch update on '{table}' has no statements"
            )));
        }

        let mut pass = self.pass();
        let mut sql = String::new();
        for (i, provider) in providers.iter().enumerate() {
            pass.cache = AliasCache::new();
            pass.tables.clear();
            sql.push_str(&update_sql(&mut pass, provider, table, &IndexPath::root(i))?);
            sql.push(';');
        }
        let sql = self.dialect.wrap_batch(sql);
        Ok(self.finish("batch_update", sql, pass.params))
    }

    // ── DELETE ──────────────────────────────────────────────────────

    /// Compiles a DELETE. Columns are not qualified.
    ///
    /// # Errors
    ///
    /// Fails with [`QuarryError::InvalidProvider`] when no condition
    /// restricts the delete.
    pub fn compile_delete(&self, provider: &DeleteProvider, table: &str) -> QuarryResult<Statement> {
        let span = compile_span("delete", table);
        let _guard = span.enter();

        if provider.conditions.is_empty() {
            return Err(QuarryError::InvalidProvider(format!(
                "delete from '{table}' requires at least one condition"
            )));
        }

        let mut pass = self.pass();
        pass.register_subqueries(&provider.conditions)?;
        let schema = self.schema;
        let scope = Scope {
            table,
            alias: None,
            meta: schema.table(table)?,
        };
        let path = IndexPath::root(0).child("dt");
        let where_sql = compile_group(&mut pass, &scope, &provider.conditions, &path, ClauseMode::Where)?;
        if where_sql.is_empty() {
            return Err(QuarryError::InvalidProvider(format!(
                "delete from '{table}' has only empty condition groups"
            )));
        }

        let tail = self.dialect.mutation_tail("delete", table, &[], provider.limit)?;
        let sql = format!("DELETE FROM {table} WHERE {where_sql}{tail}");
        Ok(self.finish("delete", sql, pass.params))
    }
}

/// The column a SET or INSERT entry writes: a logical field, or a physical
/// column of the table.
fn write_column<'m>(meta: &'m TableMeta, table: &str, field: &'m str) -> QuarryResult<&'m str> {
    meta.column_of(field)
        .or_else(|| meta.has_column(field).then_some(field))
        .ok_or_else(|| {
            QuarryError::UnknownField(format!(
                "cannot write '{field}': not a field of table '{table}'"
            ))
        })
}

fn insert_sql(pass: &mut Pass<'_>, rows: &[InsertProvider], table: &str) -> QuarryResult<String> {
    let first = rows.first().ok_or_else(|| {
        QuarryError::InvalidProvider(format!("insert into '{table}' has no rows"))
    })?;
    if first.values.is_empty() {
        return Err(QuarryError::InvalidProvider(format!(
            "insert into '{table}' has no values"
        )));
    }

    let schema = pass.schema;
    let meta = schema.table(table)?;
    let columns = first
        .fields()
        .map(|field| write_column(meta, table, field))
        .collect::<QuarryResult<Vec<_>>>()?;

    let mut tuples = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        if !row.fields().eq(first.fields()) {
            return Err(QuarryError::InvalidProvider(format!(
                "insert row #{r} into '{table}' does not list the fields of row #0"
            )));
        }
        let path = IndexPath::root(r).child("i");
        let placeholders: Vec<String> = row
            .values
            .iter()
            .enumerate()
            .map(|(c, (_, value))| pass.bind(Namespace::Field, path.key(FIELD_PREFIX, c), value.clone()))
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(", "),
        tuples.join(", ")
    ))
}

fn update_sql(pass: &mut Pass<'_>, provider: &UpdateProvider, table: &str, path: &IndexPath) -> QuarryResult<String> {
    if provider.sets.is_empty() {
        return Err(QuarryError::InvalidProvider(format!(
            "update on '{table}' has no fields to set"
        )));
    }
    if provider.conditions.is_empty() {
        return Err(QuarryError::InvalidProvider(format!(
            "update on '{table}' requires at least one condition"
        )));
    }
    if !provider.joins.is_empty() {
        pass.dialect.check_joined_update(table)?;
    }

    pass.claim(&provider.token, table)?;
    pass.register_subqueries(&provider.conditions)?;
    pass.register_joins(&provider.joins)?;

    let schema = pass.schema;
    let meta = schema.table(table)?;
    let scope = Scope {
        table,
        alias: Some(pass.cache.alias(&provider.token)),
        meta,
    };

    let mut joined = Collected::default();
    let joins = compile_joins(pass, &scope, &provider.joins, &path.child("cl"), Collect::NONE, &mut joined)?;
    // joined tables may share column names, so SET targets are qualified
    let target = |column: &str| {
        if joins.is_empty() {
            column.to_string()
        } else {
            qualify(scope.alias.as_deref(), column)
        }
    };

    let set_path = path.child("u");
    let mut sets = Vec::with_capacity(provider.sets.len());
    for (i, set) in provider.sets.iter().enumerate() {
        let column = target(write_column(meta, table, &set.field)?);
        let placeholder = pass.bind(Namespace::Field, set_path.key(FIELD_PREFIX, i), set.value.clone());
        sets.push(match set.op {
            SetOp::Set => format!("{column} = {placeholder}"),
            SetOp::Increment => format!("{column} = {column} + {placeholder}"),
            SetOp::Decrement => format!("{column} = {column} - {placeholder}"),
        });
    }

    let root_where = compile_group(pass, &scope, &provider.conditions, &path.child("ut"), ClauseMode::Where)?;
    if root_where.is_empty() {
        return Err(QuarryError::InvalidProvider(format!(
            "update on '{table}' has only empty condition groups"
        )));
    }
    let mut where_parts = Vec::with_capacity(joined.where_side.len() + 1);
    where_parts.push(root_where);
    where_parts.append(&mut joined.where_side);
    let where_sql = combine_where(where_parts);

    let mut orders = Vec::with_capacity(provider.orders.len());
    for order in &provider.orders {
        orders.push(order_item(pass, &scope, order)?);
    }
    let tail = pass.dialect.mutation_tail("update", table, &orders, provider.limit)?;

    Ok(format!(
        "UPDATE {table} {}{joins} SET {} WHERE {where_sql}{tail}",
        scope.alias.as_deref().unwrap_or_default(),
        sets.join(", ")
    ))
}
