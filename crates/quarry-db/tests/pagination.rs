//! Paginated reads and statement execution through a recording executor.

use std::sync::Mutex;

use quarry_core::{QuarryError, QuarryResult};
use quarry_db::dialect::Dialect;
use quarry_db::executor::{self, StatementExecutor};
use quarry_db::query::compiler::{Params, SqlCompiler};
use quarry_db::query::lookups::Filterable;
use quarry_db::query::provider::{Join, QueryProvider, UpdateProvider};
use quarry_db::query::raw::RawStatement;
use quarry_db::row::Row;
use quarry_db::schema::SchemaRegistry;
use quarry_db::value::Value;

/// Answers every count with `total` and every fetch with `rows`, recording
/// the SQL and the number of bound values it was given.
struct Recorder {
    total: u64,
    rows: Vec<Row>,
    seen: Mutex<Vec<(String, usize)>>,
}

impl Recorder {
    fn new(total: u64, rows: Vec<Row>) -> Self {
        Self {
            total,
            rows,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, sql: &str, params: &Params) {
        self.seen.lock().unwrap().push((sql.to_string(), params.len()));
    }

    fn seen(&self) -> Vec<(String, usize)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StatementExecutor for Recorder {
    async fn count(&self, sql: &str, params: &Params) -> QuarryResult<u64> {
        self.record(sql, params);
        Ok(self.total)
    }

    async fn fetch(&self, sql: &str, params: &Params) -> QuarryResult<Vec<Row>> {
        self.record(sql, params);
        Ok(self.rows.clone())
    }

    async fn execute(&self, sql: &str, params: &Params) -> QuarryResult<u64> {
        self.record(sql, params);
        Ok(params.len() as u64)
    }
}

fn schema() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_table("user", [("id", "id"), ("name", "name"), ("age", "age")])
        .with_table("order", [("id", "id"), ("userId", "user_id"), ("amount", "amount")])
}

fn age_row(age: i64, n: i64) -> Row {
    Row::new(vec!["age".into(), "n".into()], vec![Value::Int(age), Value::Int(n)])
}

#[tokio::test]
async fn test_empty_count_never_fetches() {
    let schema = schema();
    let compiler = SqlCompiler::new(&schema);
    let db = Recorder::new(0, vec![age_row(20, 1)]);
    let query = QueryProvider::new().select("name").greater_than("age", 99);

    let page = executor::page(&db, &compiler, &query, "user", 3, 10).await.unwrap();

    assert_eq!(page.total, 0);
    assert!(page.list.is_empty());
    assert_eq!(
        db.seen(),
        vec![(
            "SELECT count(1) FROM user t0 WHERE t0.age > #{request.filter.filter_v0_tl_0}".to_string(),
            1
        )]
    );
}

#[tokio::test]
async fn test_grouped_join_page_on_postgres() {
    let schema = schema();
    let compiler = SqlCompiler::new(&schema).with_dialect(Dialect::PostgreSql);
    let user = QueryProvider::for_table("user").select("age").group_by("age");
    let query = QueryProvider::new()
        .count("n")
        .greater_equal("amount", 10)
        .left_join(Join::new("user_id", "id", user));
    let db = Recorder::new(2, vec![age_row(20, 4), age_row(30, 1)]);

    let page = executor::page(&db, &compiler, &query, "order", 2, 5).await.unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.list[0].get::<i64>("n").unwrap(), 4);
    let seen = db.seen();
    assert_eq!(
        seen[0].0,
        "SELECT count(1) FROM (SELECT count(1) FROM order t0 LEFT JOIN user t1 ON (t0.user_id = t1.id) \
         WHERE t0.amount >= #{request.filter.filter_v0_tl_0} GROUP BY t1.age) s"
    );
    assert_eq!(
        seen[1].0,
        "SELECT count(1) AS n, t1.age FROM order t0 LEFT JOIN user t1 ON (t0.user_id = t1.id) \
         WHERE t0.amount >= #{request.filter.filter_v0_tl_0} GROUP BY t1.age LIMIT 5 OFFSET 5"
    );
    assert_eq!(seen[0].1, seen[1].1);
}

#[tokio::test]
async fn test_union_page_counts_every_branch() {
    let schema = schema();
    let compiler = SqlCompiler::new(&schema);
    let refunds = QueryProvider::new().select("id").less_than("amount", 0);
    let query = QueryProvider::new()
        .select("id")
        .greater_than("amount", 100)
        .union_all(refunds);
    let db = Recorder::new(3, vec![]);

    executor::page(&db, &compiler, &query, "order", 1, 2).await.unwrap();

    let union_sql = "(SELECT t0.id FROM order t0 WHERE t0.amount > #{request.filter.filter_v0_tl_0}) \
                     UNION ALL (SELECT t1.id FROM order t1 WHERE t1.amount < #{request.filter.filter_v0_un0_tl_0})";
    assert_eq!(
        db.seen(),
        vec![
            (format!("SELECT count(1) FROM ({union_sql}) s"), 2),
            (format!("{union_sql} LIMIT 0,2"), 2),
        ]
    );
}

#[tokio::test]
async fn test_invalid_page_runs_nothing() {
    let schema = schema();
    let compiler = SqlCompiler::new(&schema);
    let db = Recorder::new(7, vec![]);
    let err = executor::page(&db, &compiler, &QueryProvider::new(), "user", 1, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::InvalidPage(_)));
    assert!(db.seen().is_empty());
}

#[test]
fn test_update_and_raw_statements_run() {
    let schema = schema();
    let compiler = SqlCompiler::new(&schema);
    let db = Recorder::new(0, vec![]);

    let update = UpdateProvider::new().increment("amount", 5).by_id(1);
    let stmt = compiler.compile_update(&update, "order").unwrap();
    let affected = tokio_test::block_on(executor::run(&db, &stmt)).unwrap();
    assert_eq!(affected, 2);

    let raw = RawStatement::new(
        "UPDATE order SET amount = ? WHERE id = ?",
        vec![Value::Int(3), Value::Int(1)],
    )
    .into_statement("request");
    assert_eq!(raw.sql, "UPDATE order SET amount = #{request[0]} WHERE id = #{request[1]}");
    let affected = tokio_test::block_on(executor::run(&db, &raw)).unwrap();
    assert_eq!(affected, 2);
}
