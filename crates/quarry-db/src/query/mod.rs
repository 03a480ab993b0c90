//! Provider building and SQL compilation.
//!
//! - [`lookups`] - Conditions, condition groups and the [`Filterable`] builder trait
//! - [`provider`] - Query, update and delete providers
//! - [`compiler`] - The SQL compiler and its statement assemblers
//! - [`raw`] - Hand-written SQL support

pub mod compiler;
pub mod lookups;
pub mod provider;
pub mod raw;

pub use compiler::{PagedStatement, Params, SqlCompiler, Statement};
pub use lookups::{Comparison, Condition, ConditionGroup, Connector, DateBound, Filter, Filterable, GuardKind, LikeKind};
pub use provider::{DeleteProvider, Direction, HavingFunc, InsertProvider, Join, OrderFunc, QueryProvider, UpdateProvider};
pub use raw::{rewrite_positional, RawStatement};
