//! Core error types for the quarry crates.
//!
//! [`QuarryError`] covers every failure the compiler can raise while turning a
//! provider tree into SQL, plus the configuration and execution errors raised
//! around it. Compile failures are immediate: the compiler never falls back to
//! a partially rendered statement.

use thiserror::Error;

/// The primary error type for the quarry crates.
///
/// The first group of variants is raised synchronously by the SQL compiler.
/// Each message names the offending field, table, or condition so the caller
/// can locate the faulty part of the provider tree.
#[derive(Error, Debug)]
pub enum QuarryError {
    // ── Compilation ──────────────────────────────────────────────────

    /// A provider is missing something the statement requires, such as the
    /// filter tree of an UPDATE/DELETE or the table name of a joined branch.
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// A logical field name resolved to neither a column nor a known field.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A SELECT resolved to an empty column list.
    #[error("Empty projection: {0}")]
    EmptyProjection(String),

    /// A subquery operator was given a provider that cannot be compiled.
    #[error("Invalid subquery: {0}")]
    InvalidSubquery(String),

    /// An IN / NOT IN operator was given a null value.
    #[error("Invalid IN value: {0}")]
    InvalidInValue(String),

    /// The table is not present in the schema registry.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Page number or page size below 1.
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value or schema file is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Execution ────────────────────────────────────────────────────

    /// Raised by a downstream statement executor.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl QuarryError {
    /// Returns `true` for errors raised while compiling a provider tree.
    pub const fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidProvider(_)
                | Self::UnknownField(_)
                | Self::EmptyProjection(_)
                | Self::InvalidSubquery(_)
                | Self::InvalidInValue(_)
                | Self::UnknownTable(_)
                | Self::InvalidPage(_)
        )
    }
}

/// A convenience type alias for `Result<T, QuarryError>`.
pub type QuarryResult<T> = Result<T, QuarryError>;
