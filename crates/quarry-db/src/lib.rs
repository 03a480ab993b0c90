//! # quarry-db
//!
//! Provider builders and the dynamic SQL compiler for quarry.
//!
//! ## Architecture
//!
//! A caller describes a statement with a provider
//! ([`QueryProvider`](query::provider::QueryProvider),
//! [`InsertProvider`](query::provider::InsertProvider),
//! [`UpdateProvider`](query::provider::UpdateProvider) or
//! [`DeleteProvider`](query::provider::DeleteProvider)): conditions, joins,
//! grouping, ordering, aggregation and unions. The
//! [`SqlCompiler`](query::compiler::SqlCompiler) turns it into SQL with named
//! placeholders plus the map of bound values, resolving logical field names
//! through a read-only [`SchemaRegistry`](schema::SchemaRegistry).
//!
//! Compilation is synchronous and keeps no state between calls. Running the
//! SQL is left to a [`StatementExecutor`](executor::StatementExecutor).
//!
//! ## Module Overview
//!
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`schema`] - Table metadata and the schema registry
//! - [`dialect`] - Backend-specific SQL fragments
//! - [`query`] - Providers, conditions and the compiler
//! - [`row`] - Result rows
//! - [`executor`] - The executor trait and pagination helpers

// These clippy lints are intentionally allowed for the compiler crate:
// - too_many_lines: statement assembly reads best as one function per statement
// - result_large_err: QuarryError is the crate-wide error type
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - needless_pass_by_value: builder signatures take owned values
// - return_self_not_must_use: builder pattern methods are self-documenting
// - use_self: explicit type names are clearer in some contexts
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::use_self)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_arguments)]

pub mod dialect;
pub mod executor;
pub mod query;
pub mod row;
pub mod schema;
pub mod value;

pub use dialect::Dialect;
pub use executor::{PageInfo, StatementExecutor};
pub use query::{DeleteProvider, Filterable, InsertProvider, QueryProvider, SqlCompiler, Statement, UpdateProvider};
pub use row::{FromValue, Row};
pub use schema::{SchemaRegistry, TableMeta};
pub use value::Value;
