//! Reading [`Settings`] from configuration files and the environment.
//!
//! Precedence, lowest first: the built-in defaults, a TOML or JSON file, then
//! `QUARRY_*` environment variables. A file only lists the keys it changes.
//!
//! | Variable | Field |
//! |---|---|
//! | `QUARRY_DEBUG` | `debug` |
//! | `QUARRY_LOG_LEVEL` | `log_level` |
//! | `QUARRY_DIALECT` | `dialect` |
//! | `QUARRY_PARAM_ROOT` | `param_root` |
//! | `QUARRY_LOG_SQL` | `log_sql` |
//! | `QUARRY_SCHEMA_FILE` | `schema_file` |
//!
//! ```rust,no_run
//! use quarry_core::settings_loader;
//!
//! let settings = settings_loader::from_file_with_env("config/quarry.toml").unwrap();
//! println!("compiling for {}", settings.dialect);
//! ```

use std::path::{Path, PathBuf};

use crate::error::{QuarryError, QuarryResult};
use crate::settings::Settings;

/// Syntax of a settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// `.json` files are JSON; everything else is read as TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// Parses a settings document; absent keys keep their defaults.
pub fn parse(text: &str, format: Format) -> QuarryResult<Settings> {
    let parsed = match format {
        Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| {
        QuarryError::ConfigurationError(format!("invalid {} settings: {e}", format.name()))
    })
}

pub fn from_toml_str(text: &str) -> QuarryResult<Settings> {
    parse(text, Format::Toml)
}

pub fn from_json_str(text: &str) -> QuarryResult<Settings> {
    parse(text, Format::Json)
}

/// Reads a settings file, choosing the format from its extension.
pub fn from_file(path: impl AsRef<Path>) -> QuarryResult<Settings> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        QuarryError::ConfigurationError(format!(
            "cannot read settings file '{}': {e}",
            path.display()
        ))
    })?;
    parse(&text, Format::from_path(path))
}

/// [`from_file`] followed by [`apply_env_overrides`].
pub fn from_file_with_env(path: impl AsRef<Path>) -> QuarryResult<Settings> {
    let mut settings = from_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// The defaults with environment overrides applied.
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Overwrites fields from `QUARRY_*` variables that are set.
///
/// Flags are true for `true`, `1` or `yes` in any case. A blank
/// `QUARRY_PARAM_ROOT` is ignored; a blank `QUARRY_SCHEMA_FILE` clears the
/// schema path.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(val) = var("QUARRY_DEBUG") {
        settings.debug = flag(&val);
    }
    if let Some(val) = var("QUARRY_LOG_LEVEL") {
        settings.log_level = val;
    }
    if let Some(val) = var("QUARRY_DIALECT") {
        settings.dialect = val.trim().to_lowercase();
    }
    if let Some(val) = var("QUARRY_PARAM_ROOT") {
        let root = val.trim();
        if !root.is_empty() {
            settings.param_root = root.to_string();
        }
    }
    if let Some(val) = var("QUARRY_LOG_SQL") {
        settings.log_sql = flag(&val);
    }
    if let Some(val) = var("QUARRY_SCHEMA_FILE") {
        let path = val.trim();
        settings.schema_file = (!path.is_empty()).then(|| PathBuf::from(path));
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn flag(val: &str) -> bool {
    let val = val.trim();
    ["true", "1", "yes"].iter().any(|t| val.eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("quarry-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    // ── Documents ───────────────────────────────────────────────────

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = from_toml_str(
            r#"
            dialect = "postgresql"
            log_sql = true
            schema_file = "config/schema.toml"

            [extra]
            max_page_size = 500
        "#,
        )
        .unwrap();
        assert_eq!(settings.dialect, "postgresql");
        assert!(settings.log_sql);
        assert_eq!(settings.schema_file, Some(PathBuf::from("config/schema.toml")));
        assert_eq!(settings.extra["max_page_size"], 500);
        assert!(settings.debug);
        assert_eq!(settings.param_root, "request");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = from_json_str(r#"{ "param_root": "req", "debug": false }"#).unwrap();
        assert_eq!(settings.param_root, "req");
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "info");

        let empty = from_json_str("{}").unwrap();
        assert_eq!(empty.dialect, "mysql");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings.dialect, "mysql");
        assert!(!settings.log_sql);
    }

    #[test]
    fn test_malformed_documents() {
        for result in [
            from_toml_str("[[not toml"),
            from_toml_str("log_sql = \"sometimes\""),
            from_json_str("{ nope"),
        ] {
            assert!(matches!(result, Err(QuarryError::ConfigurationError(_))));
        }
    }

    // ── Files ───────────────────────────────────────────────────────

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/quarry.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a/quarry.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a/quarry.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a/quarry")), Format::Toml);
    }

    #[test]
    fn test_from_file_by_extension() {
        let toml = scratch_file("settings.toml", "dialect = \"postgresql\"\n");
        assert_eq!(from_file(&toml).unwrap().dialect, "postgresql");
        std::fs::remove_file(&toml).ok();

        let json = scratch_file("settings.json", r#"{ "param_root": "ctx" }"#);
        assert_eq!(from_file(&json).unwrap().param_root, "ctx");
        std::fs::remove_file(&json).ok();
    }

    #[test]
    fn test_from_file_missing() {
        let result = from_file("/nonexistent/quarry.toml");
        assert!(matches!(result, Err(QuarryError::ConfigurationError(ref m)) if m.contains("cannot read")));
    }

    // ── Environment ─────────────────────────────────────────────────
    //
    // One variable per test so they can run in parallel.

    #[test]
    fn test_env_dialect_is_normalized() {
        let mut settings = Settings::default();
        std::env::set_var("QUARRY_DIALECT", " PostgreSQL ");
        apply_env_overrides(&mut settings);
        std::env::remove_var("QUARRY_DIALECT");
        assert_eq!(settings.dialect, "postgresql");
    }

    #[test]
    fn test_env_debug_flag() {
        let mut settings = Settings::default();
        std::env::set_var("QUARRY_DEBUG", "no");
        apply_env_overrides(&mut settings);
        assert!(!settings.debug);
        std::env::set_var("QUARRY_DEBUG", "YES");
        apply_env_overrides(&mut settings);
        std::env::remove_var("QUARRY_DEBUG");
        assert!(settings.debug);
    }

    #[test]
    fn test_env_log_level() {
        let mut settings = Settings::default();
        std::env::set_var("QUARRY_LOG_LEVEL", "quarry_db=trace");
        apply_env_overrides(&mut settings);
        std::env::remove_var("QUARRY_LOG_LEVEL");
        assert_eq!(settings.log_level, "quarry_db=trace");
    }

    #[test]
    fn test_env_blank_param_root_ignored() {
        let mut settings = Settings::default();
        std::env::set_var("QUARRY_PARAM_ROOT", "   ");
        apply_env_overrides(&mut settings);
        std::env::remove_var("QUARRY_PARAM_ROOT");
        assert_eq!(settings.param_root, "request");
    }

    #[test]
    fn test_env_schema_file_set_and_cleared() {
        let mut settings = Settings::default();
        std::env::set_var("QUARRY_SCHEMA_FILE", "/etc/quarry/schema.toml");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.schema_file, Some(PathBuf::from("/etc/quarry/schema.toml")));
        std::env::set_var("QUARRY_SCHEMA_FILE", "");
        apply_env_overrides(&mut settings);
        std::env::remove_var("QUARRY_SCHEMA_FILE");
        assert!(settings.schema_file.is_none());
    }

    #[test]
    fn test_from_env_log_sql() {
        std::env::set_var("QUARRY_LOG_SQL", "1");
        let settings = from_env();
        std::env::remove_var("QUARRY_LOG_SQL");
        assert!(settings.log_sql);
    }
}
