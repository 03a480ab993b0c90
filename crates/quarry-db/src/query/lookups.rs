//! Conditions and condition trees.
//!
//! A [`Condition`] is one `field <filter> value` leaf together with the
//! [`Connector`] that joins it to the preceding leaf. A [`ConditionGroup`]
//! holds an ordered list of leaves followed by nested groups; each nested
//! group is rendered parenthesized behind its own connector.
//!
//! # Examples
//!
//! ```
//! use quarry_db::query::lookups::{ConditionGroup, Filterable};
//!
//! // age >= 18 AND (name = 'alice' OR name = 'bob')
//! let names = ConditionGroup::new()
//!     .equal("name", "alice")
//!     .or_equal("name", "bob");
//! let group = ConditionGroup::new()
//!     .greater_equal("age", 18)
//!     .and_group(names);
//! assert_eq!(group.conditions.len(), 1);
//! assert_eq!(group.groups.len(), 1);
//! ```

use chrono::NaiveDate;

use crate::query::provider::QueryProvider;
use crate::value::Value;

/// The boolean operator placed in front of a condition or group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    /// The connector with surrounding spaces, ready to splice between fragments.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// A binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
}

impl Comparison {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
        }
    }
}

/// Where the `%` wildcards go around a `like` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeKind {
    /// `%value%`
    Contains,
    /// `%value`, matching a suffix.
    Left,
    /// `value%`, matching a prefix.
    Right,
}

/// Signed comparisons against zero used to guard increments and decrements,
/// e.g. `stock - ? >= 0` before taking `?` items out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    /// `field + value > 0`
    UpGreaterThan,
    /// `field + value >= 0`
    UpGreaterEqual,
    /// `field - value > 0`
    ReduceGreaterThan,
    /// `field - value >= 0`
    ReduceGreaterEqual,
}

impl GuardKind {
    /// The arithmetic sign and the comparison against zero.
    pub const fn parts(self) -> (&'static str, &'static str) {
        match self {
            Self::UpGreaterThan => ("+", ">"),
            Self::UpGreaterEqual => ("+", ">="),
            Self::ReduceGreaterThan => ("-", ">"),
            Self::ReduceGreaterEqual => ("-", ">="),
        }
    }
}

/// Which end of its day a date operand stands for in a range filter.
///
/// A date-only operand compared against a datetime column would otherwise
/// cut off everything after midnight on the closing day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateBound {
    /// `00:00:00` of the day.
    Begin,
    /// `23:59:59` of the day.
    End,
}

impl DateBound {
    /// Widens a [`Value::Date`], or a `YYYY-MM-DD` string, to a
    /// [`Value::DateTime`] at this bound. Other values pass through.
    pub fn apply(self, value: Value) -> Value {
        let date = match &value {
            Value::Date(d) => *d,
            Value::String(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) => return value,
            },
            _ => return value,
        };
        let stamp = match self {
            Self::Begin => date.and_hms_opt(0, 0, 0),
            Self::End => date.and_hms_opt(23, 59, 59),
        };
        stamp.map_or(value, Value::DateTime)
    }
}

/// The operator and operand of one condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field <cmp> value`
    Compare(Comparison, Value),
    /// `field <cmp> other_field`, no bound value.
    CompareField(Comparison, String),
    /// `DATE_FORMAT(field, pattern) <cmp> value`
    CompareDateFormat {
        cmp: Comparison,
        pattern: String,
        value: Value,
    },
    /// `field like <pattern>`
    Like(LikeKind, Value),
    /// `field in (...)`; the value is expanded by [`Value::in_items`].
    In(Value),
    /// `field not in (...)`
    NotIn(Value),
    /// `field in (SELECT ...)`
    InQuery(Box<QueryProvider>),
    /// `field not in (SELECT ...)`
    NotInQuery(Box<QueryProvider>),
    /// Increment/decrement guard, see [`GuardKind`].
    Guard(GuardKind, Value),
    IsNull,
    IsNotNull,
}

/// A single leaf of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub filter: Filter,
    pub connector: Connector,
}

/// An ordered list of leaves followed by nested, parenthesized groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
    pub groups: Vec<(ConditionGroup, Connector)>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the group has neither leaves nor nested groups.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }

    /// Visits every subquery provider reachable from this group.
    pub(crate) fn subqueries(&self) -> Vec<&QueryProvider> {
        let mut out = Vec::new();
        self.collect_subqueries(&mut out);
        out
    }

    fn collect_subqueries<'p>(&'p self, out: &mut Vec<&'p QueryProvider>) {
        for condition in &self.conditions {
            if let Filter::InQuery(p) | Filter::NotInQuery(p) = &condition.filter {
                out.push(p);
            }
        }
        for (group, _) in &self.groups {
            group.collect_subqueries(out);
        }
    }
}

/// Builder methods shared by everything that owns a condition tree.
///
/// Every method consumes and returns `self`. Plain method names append with
/// [`Connector::And`]; the `or_` variants append with [`Connector::Or`].
/// The connector of the very first leaf is never rendered.
pub trait Filterable: Sized {
    /// The condition tree being built.
    fn condition_group(&mut self) -> &mut ConditionGroup;

    fn and_where(mut self, field: impl Into<String>, filter: Filter) -> Self {
        push(self.condition_group(), field.into(), filter, Connector::And);
        self
    }

    fn or_where(mut self, field: impl Into<String>, filter: Filter) -> Self {
        push(self.condition_group(), field.into(), filter, Connector::Or);
        self
    }

    fn and_group(mut self, group: ConditionGroup) -> Self {
        self.condition_group().groups.push((group, Connector::And));
        self
    }

    fn or_group(mut self, group: ConditionGroup) -> Self {
        self.condition_group().groups.push((group, Connector::Or));
        self
    }

    // ── Comparisons ─────────────────────────────────────────────────

    fn equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(Comparison::Equal, value.into()))
    }

    fn or_equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.or_where(field, Filter::Compare(Comparison::Equal, value.into()))
    }

    fn not_equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(Comparison::NotEqual, value.into()))
    }

    fn greater_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(Comparison::GreaterThan, value.into()))
    }

    fn greater_equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(Comparison::GreaterEqual, value.into()))
    }

    fn less_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(Comparison::LessThan, value.into()))
    }

    fn less_equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(Comparison::LessEqual, value.into()))
    }

    /// `field <cmp> other`, comparing two columns.
    fn compare_field(self, field: impl Into<String>, cmp: Comparison, other: impl Into<String>) -> Self {
        self.and_where(field, Filter::CompareField(cmp, other.into()))
    }

    /// `field <cmp> value` with a date operand widened to `bound`.
    fn compare_date(self, field: impl Into<String>, cmp: Comparison, bound: DateBound, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Compare(cmp, bound.apply(value.into())))
    }

    /// `field >= <day> 00:00:00`
    fn date_from(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare_date(field, Comparison::GreaterEqual, DateBound::Begin, value)
    }

    /// `field <= <day> 23:59:59`
    fn date_until(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare_date(field, Comparison::LessEqual, DateBound::End, value)
    }

    /// `DATE_FORMAT(field, pattern) <cmp> value`
    fn compare_date_format(
        self,
        field: impl Into<String>,
        cmp: Comparison,
        pattern: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.and_where(
            field,
            Filter::CompareDateFormat {
                cmp,
                pattern: pattern.into(),
                value: value.into(),
            },
        )
    }

    // ── Pattern and membership ──────────────────────────────────────

    fn like(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Like(LikeKind::Contains, value.into()))
    }

    fn left_like(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Like(LikeKind::Left, value.into()))
    }

    fn right_like(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Like(LikeKind::Right, value.into()))
    }

    fn is_in(self, field: impl Into<String>, values: impl Into<Value>) -> Self {
        self.and_where(field, Filter::In(values.into()))
    }

    fn not_in(self, field: impl Into<String>, values: impl Into<Value>) -> Self {
        self.and_where(field, Filter::NotIn(values.into()))
    }

    fn in_query(self, field: impl Into<String>, query: QueryProvider) -> Self {
        self.and_where(field, Filter::InQuery(Box::new(query)))
    }

    fn not_in_query(self, field: impl Into<String>, query: QueryProvider) -> Self {
        self.and_where(field, Filter::NotInQuery(Box::new(query)))
    }

    // ── Nulls and guards ────────────────────────────────────────────

    fn is_null(self, field: impl Into<String>) -> Self {
        self.and_where(field, Filter::IsNull)
    }

    fn is_not_null(self, field: impl Into<String>) -> Self {
        self.and_where(field, Filter::IsNotNull)
    }

    fn guard(self, field: impl Into<String>, kind: GuardKind, value: impl Into<Value>) -> Self {
        self.and_where(field, Filter::Guard(kind, value.into()))
    }
}

fn push(group: &mut ConditionGroup, field: String, filter: Filter, connector: Connector) {
    group.conditions.push(Condition {
        field,
        filter,
        connector,
    });
}

impl Filterable for ConditionGroup {
    fn condition_group(&mut self) -> &mut ConditionGroup {
        self
    }
}
