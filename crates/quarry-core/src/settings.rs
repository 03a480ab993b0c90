//! Settings for the quarry compiler.
//!
//! This module provides the [`Settings`] struct, which holds the compiler and
//! logging configuration, and [`LazySettings`], a globally-accessible,
//! lazily-initialized settings instance configured once at startup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// The complete set of compiler settings.
///
/// Missing keys take their [`Default`] values when deserializing, so a
/// configuration file only names what it changes.
///
/// # Examples
///
/// ```
/// use quarry_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.dialect, "mysql");
/// assert_eq!(settings.param_root, "request");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled. Selects the pretty log format.
    pub debug: bool,

    // ── Compiler ─────────────────────────────────────────────────────

    /// The SQL dialect name (`mysql` or `postgresql`).
    pub dialect: String,
    /// Root name of every named placeholder (`#{<root>.filter.<key>}`).
    pub param_root: String,
    /// Path of the TOML schema file loaded at startup, if any.
    pub schema_file: Option<PathBuf>,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level filter (e.g. "info", "debug", "quarry_db=trace").
    pub log_level: String,
    /// Whether compiled SQL is emitted at debug level.
    pub log_sql: bool,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            dialect: "mysql".to_string(),
            param_root: "request".to_string(),
            schema_file: None,
            log_level: "info".to_string(),
            log_sql: false,
            extra: HashMap::new(),
        }
    }
}

/// Process-wide settings, set once during startup.
///
/// Components that are not handed a [`Settings`] explicitly read this
/// instead. [`try_get`](LazySettings::try_get) lets them fall back to
/// defaults when the application never configured it.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Stores `settings`.
    ///
    /// # Panics
    ///
    /// Panics on a second call; settings are fixed for the life of the process.
    pub fn configure(&self, settings: Settings) {
        if self.inner.set(settings).is_err() {
            panic!("quarry settings are already configured");
        }
    }

    /// The configured settings.
    ///
    /// # Panics
    ///
    /// Panics when [`configure`](Self::configure) has not run yet.
    pub fn get(&self) -> &Settings {
        self.try_get()
            .expect("quarry settings are not configured; call SETTINGS.configure() during startup")
    }

    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// Settings shared by the whole process.
pub static SETTINGS: LazySettings = LazySettings::new();
