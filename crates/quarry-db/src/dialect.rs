//! Backend-specific SQL fragments.
//!
//! The compiler renders one SQL shape for every backend and defers the few
//! places where MySQL and PostgreSQL disagree to [`Dialect`]: null defaults
//! inside aggregates, date formatting, the pagination clause, row bounds on
//! UPDATE and DELETE, and the batch wrapper.

use std::fmt;
use std::str::FromStr;

use quarry_core::{QuarryError, QuarryResult};

use crate::query::lookups::LikeKind;
use crate::value::Value;

/// The SQL dialect a compiler targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB.
    #[default]
    MySql,
    /// PostgreSQL.
    PostgreSql,
}

impl FromStr for Dialect {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            other => Err(QuarryError::ConfigurationError(format!(
                "Unsupported SQL dialect '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql => write!(f, "mysql"),
            Self::PostgreSql => write!(f, "postgresql"),
        }
    }
}

impl Dialect {
    /// Builds the bound pattern for a `like` condition.
    pub fn like_pattern(self, kind: LikeKind, value: &Value) -> Value {
        let raw = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let pattern = match kind {
            LikeKind::Contains => format!("%{raw}%"),
            LikeKind::Left => format!("%{raw}"),
            LikeKind::Right => format!("{raw}%"),
        };
        Value::String(pattern)
    }

    /// Wraps an aggregate operand so null rows count as zero.
    pub fn null_default(self, expr: &str) -> String {
        match self {
            Self::MySql => format!("ifnull({expr}, 0)"),
            Self::PostgreSql => format!("coalesce({expr}, 0)"),
        }
    }

    /// Formats a date/time expression with a backend format pattern.
    ///
    /// The pattern is emitted as a string literal with its quotes doubled.
    pub fn date_format(self, expr: &str, pattern: &str) -> String {
        let pattern = pattern.replace('\'', "''");
        match self {
            Self::MySql => format!("DATE_FORMAT({expr},'{pattern}')"),
            Self::PostgreSql => format!("to_char({expr},'{pattern}')"),
        }
    }

    /// Appends the page window to a data query.
    ///
    /// Pages are 1-based; the offset is `(page_number - 1) * page_size`.
    pub fn page_clause(self, sql: &str, page_number: u64, page_size: u64) -> QuarryResult<String> {
        let offset = page_offset(page_number, page_size)?;
        Ok(match self {
            Self::MySql => format!("{sql} LIMIT {offset},{page_size}"),
            Self::PostgreSql => format!("{sql} LIMIT {page_size} OFFSET {offset}"),
        })
    }

    /// Renders a trailing row limit; zero and `None` mean unlimited.
    pub fn limit_clause(self, limit: Option<u64>) -> String {
        match limit {
            Some(n) if n > 0 => format!(" LIMIT {n}"),
            _ => String::new(),
        }
    }

    /// Renders the `ORDER BY ... LIMIT n` tail of an UPDATE or DELETE.
    ///
    /// PostgreSQL accepts neither clause on those statements, so asking for
    /// either fails instead of producing SQL the server rejects.
    pub fn mutation_tail(
        self,
        statement: &str,
        table: &str,
        orders: &[String],
        limit: Option<u64>,
    ) -> QuarryResult<String> {
        let limit_sql = self.limit_clause(limit);
        if orders.is_empty() && limit_sql.is_empty() {
            return Ok(limit_sql);
        }
        match self {
            Self::MySql if orders.is_empty() => Ok(limit_sql),
            Self::MySql => Ok(format!(" ORDER BY {}{limit_sql}", orders.join(", "))),
            Self::PostgreSql => Err(QuarryError::InvalidProvider(format!(
                "{statement} on '{table}' cannot be ordered or limited under postgresql"
            ))),
        }
    }

    /// Rejects a joined UPDATE where the backend has no `UPDATE ... JOIN` form.
    pub fn check_joined_update(self, table: &str) -> QuarryResult<()> {
        match self {
            Self::MySql => Ok(()),
            Self::PostgreSql => Err(QuarryError::InvalidProvider(format!(
                "update on '{table}' cannot carry joins under postgresql"
            ))),
        }
    }

    /// Wraps a `;`-joined batch of statements for multi-statement execution.
    ///
    /// Both supported backends accept the joined text as is.
    pub fn wrap_batch(self, sql: String) -> String {
        match self {
            Self::MySql | Self::PostgreSql => sql,
        }
    }
}

/// The row offset of a 1-based page, rejecting a page number or size of zero.
pub fn page_offset(page_number: u64, page_size: u64) -> QuarryResult<u64> {
    if page_number < 1 || page_size < 1 {
        return Err(QuarryError::InvalidPage(format!(
            "page_number={page_number}, page_size={page_size}; both must be at least 1"
        )));
    }
    Ok((page_number - 1).saturating_mul(page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10).unwrap(), 0);
        assert_eq!(page_offset(4, 25).unwrap(), 75);
        assert!(matches!(page_offset(0, 10), Err(QuarryError::InvalidPage(_))));
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!(" PostgreSQL ".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("pg".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(QuarryError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_default_is_mysql() {
        assert_eq!(Dialect::default(), Dialect::MySql);
        assert_eq!(Dialect::default().to_string(), "mysql");
    }

    #[test]
    fn test_like_pattern() {
        let v = Value::from("smith");
        let d = Dialect::MySql;
        assert_eq!(d.like_pattern(LikeKind::Contains, &v), Value::from("%smith%"));
        assert_eq!(d.like_pattern(LikeKind::Left, &v), Value::from("%smith"));
        assert_eq!(d.like_pattern(LikeKind::Right, &v), Value::from("smith%"));
        assert_eq!(d.like_pattern(LikeKind::Right, &Value::Int(12)), Value::from("12%"));
    }

    #[test]
    fn test_null_default_and_date_format() {
        assert_eq!(Dialect::MySql.null_default("t0.amount"), "ifnull(t0.amount, 0)");
        assert_eq!(Dialect::PostgreSql.null_default("t0.amount"), "coalesce(t0.amount, 0)");
        assert_eq!(
            Dialect::MySql.date_format("t0.created", "%Y-%m"),
            "DATE_FORMAT(t0.created,'%Y-%m')"
        );
        assert_eq!(
            Dialect::PostgreSql.date_format("t0.created", "YYYY-MM"),
            "to_char(t0.created,'YYYY-MM')"
        );
    }

    #[test]
    fn test_date_format_doubles_quotes() {
        assert_eq!(
            Dialect::MySql.date_format("t0.created", "%Y') OR ('1"),
            "DATE_FORMAT(t0.created,'%Y'') OR (''1')"
        );
        assert_eq!(
            Dialect::PostgreSql.date_format("t0.created", "HH24'h'"),
            "to_char(t0.created,'HH24''h''')"
        );
    }

    #[test]
    fn test_mutation_tail() {
        let orders = vec!["t0.id ASC".to_string()];
        assert_eq!(
            Dialect::MySql.mutation_tail("update", "user", &orders, Some(1)).unwrap(),
            " ORDER BY t0.id ASC LIMIT 1"
        );
        assert_eq!(Dialect::MySql.mutation_tail("delete", "user", &[], Some(2)).unwrap(), " LIMIT 2");
        assert_eq!(Dialect::PostgreSql.mutation_tail("delete", "user", &[], Some(0)).unwrap(), "");
        assert!(matches!(
            Dialect::PostgreSql.mutation_tail("update", "user", &orders, None),
            Err(QuarryError::InvalidProvider(_))
        ));
        assert!(matches!(
            Dialect::PostgreSql.mutation_tail("delete", "user", &[], Some(1)),
            Err(QuarryError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_joined_update_support() {
        assert!(Dialect::MySql.check_joined_update("order").is_ok());
        assert!(matches!(
            Dialect::PostgreSql.check_joined_update("order"),
            Err(QuarryError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_page_clause() {
        assert_eq!(
            Dialect::MySql.page_clause("SELECT 1", 3, 20).unwrap(),
            "SELECT 1 LIMIT 40,20"
        );
        assert_eq!(
            Dialect::PostgreSql.page_clause("SELECT 1", 1, 10).unwrap(),
            "SELECT 1 LIMIT 10 OFFSET 0"
        );
        assert!(matches!(
            Dialect::MySql.page_clause("SELECT 1", 0, 10),
            Err(QuarryError::InvalidPage(_))
        ));
        assert!(Dialect::MySql.page_clause("SELECT 1", 1, 0).is_err());
    }

    #[test]
    fn test_limit_clause() {
        assert_eq!(Dialect::MySql.limit_clause(Some(10)), " LIMIT 10");
        assert_eq!(Dialect::MySql.limit_clause(Some(0)), "");
        assert_eq!(Dialect::MySql.limit_clause(None), "");
    }

    #[test]
    fn test_wrap_batch_identity() {
        let sql = "UPDATE a SET x = 1;UPDATE a SET x = 2;".to_string();
        assert_eq!(Dialect::MySql.wrap_batch(sql.clone()), sql);
    }
}
