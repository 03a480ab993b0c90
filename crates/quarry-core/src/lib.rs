//! # quarry-core
//!
//! Core types shared by the quarry crates: the error taxonomy, compiler
//! settings and their loaders, and tracing-based logging setup. This crate has
//! no dependency on the compiler itself.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Compiler settings and the global settings container
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{QuarryError, QuarryResult};
pub use settings::{Settings, SETTINGS};
