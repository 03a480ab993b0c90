//! Query, insert, update and delete providers.
//!
//! A provider is the builder-constructed description of one statement. The
//! compiler reads it, never mutates it, and recompiles it from scratch on
//! every call.
//!
//! Every [`QueryProvider`] carries an alias token, a process-wide serial drawn
//! when the provider is created. The compiler maps tokens to table aliases
//! (`t0`, `t1`, ...) in first-request order, and a field in one branch of a
//! join tree can reach a column of another branch through
//! [`QueryProvider::field_ref`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::query::lookups::{Comparison, ConditionGroup, Filterable};
use crate::value::Value;

/// Prefix of a cross-branch field reference: `#tas_<token>.<field>`.
pub const TABLE_REF_PREFIX: &str = "#tas_";

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> String {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed).to_string()
}

// ── Column, group, having and order specs ──────────────────────────────

/// How a selected field is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// The qualified column. The field must be known to the table.
    Plain,
    /// `count(1)` for an empty field, `count(distinct expr)` otherwise.
    Count,
    /// `sum(ifnull(expr, 0))`
    Sum,
    /// `avg(ifnull(expr, 0))`
    Avg,
    Max,
    Min,
    /// `distinct(expr)`
    Distinct,
    /// `DATE_FORMAT(col, pattern)`. The field must be known to the table.
    DateFormat(String),
    /// An arithmetic expression over fields, passed through after resolution.
    Expression,
}

/// One entry of the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub field: String,
    pub func: Aggregate,
    pub alias: Option<String>,
}

/// One GROUP BY entry, optionally date-formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub field: String,
    pub format: Option<String>,
}

/// Whether a HAVING operand is wrapped in `count()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HavingFunc {
    Plain,
    Count,
}

/// One HAVING clause; clauses are always ANDed together.
#[derive(Debug, Clone, PartialEq)]
pub struct HavingSpec {
    /// A field or an aggregate expression such as `sum(amount)`.
    pub field: String,
    pub func: HavingFunc,
    pub cmp: Comparison,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// How an ORDER BY operand is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFunc {
    Plain,
    Sum,
    Avg,
    Distinct,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
    pub func: OrderFunc,
}

// ── Joins and unions ───────────────────────────────────────────────────

/// The equality keys of a LEFT JOIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKeys {
    /// `parent.left = joined.right`, using the names verbatim.
    Single { left: String, right: String },
    /// Pairs of expressions, each side resolved against its own table.
    Composite(Vec<(String, String)>),
}

/// One LEFT JOIN.
///
/// Conditions added through [`Filterable`] on a `Join` land in its `ON`
/// clause. Conditions on the joined provider itself are WHERE-scoped.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub keys: JoinKeys,
    pub provider: QueryProvider,
    pub on: ConditionGroup,
}

impl Join {
    /// Joins on `parent.left = provider.right`.
    pub fn new(left: impl Into<String>, right: impl Into<String>, provider: QueryProvider) -> Self {
        Self {
            keys: JoinKeys::Single {
                left: left.into(),
                right: right.into(),
            },
            provider,
            on: ConditionGroup::new(),
        }
    }

    /// Joins on several `(parent, joined)` expression pairs, ANDed.
    pub fn composite<L, R>(pairs: impl IntoIterator<Item = (L, R)>, provider: QueryProvider) -> Self
    where
        L: Into<String>,
        R: Into<String>,
    {
        Self {
            keys: JoinKeys::Composite(
                pairs
                    .into_iter()
                    .map(|(l, r)| (l.into(), r.into()))
                    .collect(),
            ),
            provider,
            on: ConditionGroup::new(),
        }
    }
}

impl Filterable for Join {
    fn condition_group(&mut self) -> &mut ConditionGroup {
        &mut self.on
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    Union,
    UnionAll,
}

impl UnionKind {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Union => " UNION ",
            Self::UnionAll => " UNION ALL ",
        }
    }
}

// ── QueryProvider ──────────────────────────────────────────────────────

/// The description of a SELECT.
///
/// The root provider of a statement gets its table from the compiler call.
/// Providers used as joins, subqueries or unions name their own table with
/// [`for_table`](Self::for_table).
///
/// # Examples
///
/// ```
/// use quarry_db::query::lookups::Filterable;
/// use quarry_db::query::provider::{Join, QueryProvider};
///
/// let user = QueryProvider::for_table("user").select("userName").greater_than("age", 18);
/// let orders = QueryProvider::new()
///     .select("id")
///     .equal("status", 1)
///     .left_join(Join::new("user_id", "id", user))
///     .order_desc("id")
///     .limit(10);
/// assert_eq!(orders.joins.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryProvider {
    pub table: Option<String>,
    pub token: String,
    pub conditions: ConditionGroup,
    pub columns: Vec<ColumnSpec>,
    pub removed: BTreeSet<String>,
    pub groups: Vec<GroupSpec>,
    pub havings: Vec<HavingSpec>,
    pub orders: Vec<OrderSpec>,
    pub joins: Vec<Join>,
    pub unions: Vec<(UnionKind, QueryProvider)>,
    pub limit: Option<u64>,
    pub select_nothing: bool,
}

impl Default for QueryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Filterable for QueryProvider {
    fn condition_group(&mut self) -> &mut ConditionGroup {
        &mut self.conditions
    }
}

impl QueryProvider {
    /// Creates a root provider with a fresh alias token.
    pub fn new() -> Self {
        Self {
            table: None,
            token: next_token(),
            conditions: ConditionGroup::new(),
            columns: Vec::new(),
            removed: BTreeSet::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            joins: Vec::new(),
            unions: Vec::new(),
            limit: None,
            select_nothing: false,
        }
    }

    /// Creates a provider bound to a table, for joins, subqueries and unions.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::new()
        }
    }

    /// Replaces the generated alias token with a caller-chosen one.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// A reference to `field` of this provider's table, usable from any other
    /// branch of the same statement.
    pub fn field_ref(&self, field: &str) -> String {
        format!("{TABLE_REF_PREFIX}{}.{field}", self.token)
    }

    /// Adds the `id = value` filter.
    pub fn by_id(self, id: impl Into<Value>) -> Self {
        self.equal("id", id)
    }

    // ── SELECT list ─────────────────────────────────────────────────

    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    fn push_column(self, field: impl Into<String>, func: Aggregate, alias: Option<String>) -> Self {
        self.column(ColumnSpec {
            field: field.into(),
            func,
            alias,
        })
    }

    pub fn select(self, field: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Plain, None)
    }

    pub fn select_as(self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Plain, Some(alias.into()))
    }

    /// `count(1) AS alias`
    pub fn count(self, alias: impl Into<String>) -> Self {
        self.push_column("", Aggregate::Count, Some(alias.into()))
    }

    /// `count(distinct field) AS alias`
    pub fn count_distinct(self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Count, Some(alias.into()))
    }

    pub fn sum(self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Sum, Some(alias.into()))
    }

    pub fn avg(self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Avg, Some(alias.into()))
    }

    pub fn max(self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Max, Some(alias.into()))
    }

    pub fn min(self, field: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Min, Some(alias.into()))
    }

    pub fn distinct(self, field: impl Into<String>) -> Self {
        self.push_column(field, Aggregate::Distinct, None)
    }

    pub fn select_date_format(
        self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.push_column(field, Aggregate::DateFormat(pattern.into()), Some(alias.into()))
    }

    /// An arithmetic expression such as `price * quantity`.
    pub fn select_expression(self, expression: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(expression, Aggregate::Expression, Some(alias.into()))
    }

    /// Drops a field from the SELECT list, matched by field, column or alias.
    pub fn remove(mut self, field: impl Into<String>) -> Self {
        self.removed.insert(field.into());
        self
    }

    /// Selects nothing from this provider's own table.
    pub fn select_nothing(mut self) -> Self {
        self.select_nothing = true;
        self
    }

    // ── GROUP BY / HAVING / ORDER BY ────────────────────────────────

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.groups.push(GroupSpec {
            field: field.into(),
            format: None,
        });
        self
    }

    pub fn group_by_date_format(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.groups.push(GroupSpec {
            field: field.into(),
            format: Some(pattern.into()),
        });
        self
    }

    pub fn having(
        mut self,
        field: impl Into<String>,
        func: HavingFunc,
        cmp: Comparison,
        value: impl Into<Value>,
    ) -> Self {
        self.havings.push(HavingSpec {
            field: field.into(),
            func,
            cmp,
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, field: impl Into<String>, direction: Direction, func: OrderFunc) -> Self {
        self.orders.push(OrderSpec {
            field: field.into(),
            direction,
            func,
        });
        self
    }

    pub fn order_asc(self, field: impl Into<String>) -> Self {
        self.order(field, Direction::Asc, OrderFunc::Plain)
    }

    pub fn order_desc(self, field: impl Into<String>) -> Self {
        self.order(field, Direction::Desc, OrderFunc::Plain)
    }

    // ── Joins, unions, limit ────────────────────────────────────────

    pub fn left_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn union(mut self, other: QueryProvider) -> Self {
        self.unions.push((UnionKind::Union, other));
        self
    }

    pub fn union_all(mut self, other: QueryProvider) -> Self {
        self.unions.push((UnionKind::UnionAll, other));
        self
    }

    /// Caps the row count; zero means unlimited.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Draws a new alias token.
    ///
    /// A clone keeps the token of its source, and two table references in one
    /// statement may not share a token. Reissue before joining a clone again.
    #[must_use]
    pub fn reissue_token(mut self) -> Self {
        self.token = next_token();
        self
    }
}

// ── InsertProvider ─────────────────────────────────────────────────────

/// The values of one inserted row, in column order.
///
/// # Examples
///
/// ```
/// use quarry_db::query::provider::InsertProvider;
///
/// let row = InsertProvider::new().value("userName", "ada").value("age", 36);
/// assert_eq!(row.values.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertProvider {
    pub values: Vec<(String, Value)>,
}

impl InsertProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((field.into(), value.into()));
        self
    }

    /// The field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(field, _)| field.as_str())
    }
}

// ── UpdateProvider ─────────────────────────────────────────────────────

/// How a SET entry combines the bound value with the current column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// `col = value`
    Set,
    /// `col = col + value`
    Increment,
    /// `col = col - value`
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetField {
    pub field: String,
    pub op: SetOp,
    pub value: Value,
}

/// The description of an UPDATE. A non-empty condition tree is required.
///
/// # Examples
///
/// ```
/// use quarry_db::query::lookups::{Filterable, GuardKind};
/// use quarry_db::query::provider::UpdateProvider;
///
/// let take = UpdateProvider::new()
///     .decrement("stock", 2)
///     .by_id(7)
///     .guard("stock", GuardKind::ReduceGreaterEqual, 2);
/// assert_eq!(take.sets.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateProvider {
    pub token: String,
    pub sets: Vec<SetField>,
    /// LEFT JOINs of a multi-table update; their WHERE-scoped conditions
    /// restrict the update.
    pub joins: Vec<Join>,
    pub conditions: ConditionGroup,
    pub orders: Vec<OrderSpec>,
    pub limit: Option<u64>,
}

impl Default for UpdateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Filterable for UpdateProvider {
    fn condition_group(&mut self) -> &mut ConditionGroup {
        &mut self.conditions
    }
}

impl UpdateProvider {
    pub fn new() -> Self {
        Self {
            token: next_token(),
            sets: Vec::new(),
            joins: Vec::new(),
            conditions: ConditionGroup::new(),
            orders: Vec::new(),
            limit: None,
        }
    }

    fn push_set(mut self, field: impl Into<String>, op: SetOp, value: impl Into<Value>) -> Self {
        self.sets.push(SetField {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn set(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_set(field, SetOp::Set, value)
    }

    pub fn increment(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_set(field, SetOp::Increment, value)
    }

    pub fn decrement(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_set(field, SetOp::Decrement, value)
    }

    pub fn by_id(self, id: impl Into<Value>) -> Self {
        self.equal("id", id)
    }

    pub fn left_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn order(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(OrderSpec {
            field: field.into(),
            direction,
            func: OrderFunc::Plain,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ── DeleteProvider ─────────────────────────────────────────────────────

/// The description of a DELETE. A non-empty condition tree is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteProvider {
    pub conditions: ConditionGroup,
    pub limit: Option<u64>,
}

impl Filterable for DeleteProvider {
    fn condition_group(&mut self) -> &mut ConditionGroup {
        &mut self.conditions
    }
}

impl DeleteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(self, id: impl Into<Value>) -> Self {
        self.equal("id", id)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
