//! # quarry
//!
//! A dynamic SQL compiler: describe a statement with a provider, compile it
//! against a schema registry, and hand the SQL and its bound values to
//! whatever runs your queries.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on `quarry`
//! for everything, or on `quarry-core` / `quarry-db` directly.
//!
//! ```
//! use quarry::prelude::*;
//!
//! let schema = SchemaRegistry::new().with_table("user", [("id", "id"), ("userName", "user_name")]);
//! let compiler = SqlCompiler::new(&schema);
//!
//! let stmt = compiler
//!     .compile_update(&UpdateProvider::new().set("userName", "bob").by_id(7), "user")
//!     .unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "UPDATE user t0 SET user_name = #{request.field.field_v0_u_0} WHERE t0.id = #{request.filter.filter_v0_ut_0}"
//! );
//! ```

/// Error types, settings and logging.
pub use quarry_core as core;

/// Providers, the SQL compiler, schema metadata and the executor seam.
pub use quarry_db as db;

pub use async_trait::async_trait;

/// The types most callers need.
pub mod prelude {
    pub use quarry_core::{QuarryError, QuarryResult, Settings};
    pub use quarry_db::executor::{PageInfo, StatementExecutor};
    pub use quarry_db::query::compiler::{PagedStatement, Params, SqlCompiler, Statement};
    pub use quarry_db::query::lookups::{Comparison, ConditionGroup, DateBound, Filterable, GuardKind};
    pub use quarry_db::query::provider::{
        DeleteProvider, Direction, HavingFunc, InsertProvider, Join, OrderFunc, QueryProvider,
        UpdateProvider,
    };
    pub use quarry_db::row::{FromValue, Row};
    pub use quarry_db::schema::SchemaRegistry;
    pub use quarry_db::value::Value;
    pub use quarry_db::Dialect;
}
