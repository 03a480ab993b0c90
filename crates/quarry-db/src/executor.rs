//! The statement executor seam and the read helpers built on it.
//!
//! The compiler never talks to a database. [`StatementExecutor`] is the
//! minimal async interface a backend implements to run compiled statements;
//! the free functions here combine it with a [`SqlCompiler`] for the common
//! read paths. [`page`] runs the count query first and only renders and runs
//! the data query when the count is positive.

use quarry_core::QuarryResult;

use crate::dialect::{page_offset, Dialect};
use crate::query::compiler::{Params, SqlCompiler, Statement};
use crate::query::provider::QueryProvider;
use crate::query::raw;
use crate::row::Row;
use crate::value::Value;

/// Async executor for compiled statements.
///
/// Implementations substitute the named placeholders of `sql` with the
/// values in `params` and run the statement.
#[async_trait::async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Runs a `SELECT count(1) ...` statement and returns the count.
    async fn count(&self, sql: &str, params: &Params) -> QuarryResult<u64>;

    /// Runs a query and returns all result rows.
    async fn fetch(&self, sql: &str, params: &Params) -> QuarryResult<Vec<Row>>;

    /// Runs a statement that returns no rows, returning the affected row count.
    async fn execute(&self, sql: &str, params: &Params) -> QuarryResult<u64>;
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PageInfo<R> {
    pub total: u64,
    pub list: Vec<R>,
}

impl<R> PageInfo<R> {
    pub fn empty(total: u64) -> Self {
        Self {
            total,
            list: Vec::new(),
        }
    }
}

/// Fetches one 1-based page of `provider` over `table`.
///
/// # Errors
///
/// Fails with [`InvalidPage`](quarry_core::QuarryError::InvalidPage) before
/// anything runs when `page_number` or `page_size` is zero.
pub async fn page(
    executor: &dyn StatementExecutor,
    compiler: &SqlCompiler<'_>,
    provider: &QueryProvider,
    table: &str,
    page_number: u64,
    page_size: u64,
) -> QuarryResult<PageInfo<Row>> {
    page_offset(page_number, page_size)?;
    let paged = compiler.compile_page(provider, table)?;

    let total = executor.count(&paged.count_sql, &paged.params).await?;
    if total == 0 {
        tracing::debug!(table, "page count is zero, skipping data query");
        return Ok(PageInfo::empty(0));
    }

    let sql = paged.data_sql(page_number, page_size)?;
    let list = executor.fetch(&sql, &paged.params).await?;
    Ok(PageInfo { total, list })
}

/// Fetches one page of a hand-written query, counting with `total_sql`.
pub async fn page_sql(
    executor: &dyn StatementExecutor,
    dialect: Dialect,
    sql: &str,
    total_sql: &str,
    params: &Params,
    page_number: u64,
    page_size: u64,
) -> QuarryResult<PageInfo<Row>> {
    page_offset(page_number, page_size)?;
    let total = executor.count(total_sql, params).await?;
    if total == 0 {
        return Ok(PageInfo::empty(0));
    }
    let data_sql = dialect.page_clause(sql, page_number, page_size)?;
    let list = executor.fetch(&data_sql, params).await?;
    Ok(PageInfo { total, list })
}

/// Returns `true` when at least one row matches `provider`.
pub async fn validate(
    executor: &dyn StatementExecutor,
    compiler: &SqlCompiler<'_>,
    provider: &QueryProvider,
    table: &str,
) -> QuarryResult<bool> {
    let stmt = compiler.compile_validate(provider, table)?;
    Ok(executor.count(&stmt.sql, &stmt.params).await? > 0)
}

/// Fetches every row matching `provider`.
pub async fn list(
    executor: &dyn StatementExecutor,
    compiler: &SqlCompiler<'_>,
    provider: &QueryProvider,
    table: &str,
) -> QuarryResult<Vec<Row>> {
    let stmt = compiler.compile_select(provider, table)?;
    executor.fetch(&stmt.sql, &stmt.params).await
}

/// Fetches the first row matching `provider`, if any.
pub async fn find_one(
    executor: &dyn StatementExecutor,
    compiler: &SqlCompiler<'_>,
    provider: &QueryProvider,
    table: &str,
) -> QuarryResult<Option<Row>> {
    let stmt = compiler.compile_find_one(provider, table)?;
    Ok(executor.fetch(&stmt.sql, &stmt.params).await?.into_iter().next())
}

/// Fetches the row of `table` whose `id` column equals `id`.
pub async fn find_by_id(
    executor: &dyn StatementExecutor,
    compiler: &SqlCompiler<'_>,
    table: &str,
    id: impl Into<Value>,
) -> QuarryResult<Option<Row>> {
    let meta = compiler.schema().table(table)?;
    let stmt = raw::select_by_id(compiler.param_root(), table, meta, id);
    Ok(executor.fetch(&stmt.sql, &stmt.params).await?.into_iter().next())
}

/// Deletes the row of `table` whose `id` column equals `id`.
pub async fn delete_by_id(
    executor: &dyn StatementExecutor,
    compiler: &SqlCompiler<'_>,
    table: &str,
    id: impl Into<Value>,
) -> QuarryResult<u64> {
    compiler.schema().table(table)?;
    let stmt = raw::delete_by_id(compiler.param_root(), table, id);
    executor.execute(&stmt.sql, &stmt.params).await
}

/// Runs a compiled INSERT, UPDATE, batch UPDATE or DELETE.
pub async fn run(executor: &dyn StatementExecutor, statement: &Statement) -> QuarryResult<u64> {
    executor.execute(&statement.sql, &statement.params).await
}
