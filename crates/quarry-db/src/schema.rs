//! Table metadata consulted by the compiler.
//!
//! A [`SchemaRegistry`] maps physical table names to a [`TableMeta`], the
//! ordered list of `(logical field, physical column)` pairs for that table.
//! The registry is populated once at startup, either programmatically or from
//! a TOML document, and is only ever read during compilation.
//!
//! ```toml
//! [tables.user]
//! columns = [
//!     { field = "id", column = "id" },
//!     { field = "userName", column = "user_name" },
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use quarry_core::{QuarryError, QuarryResult, Settings};
use serde::Deserialize;

/// Column metadata for one physical table.
#[derive(Debug, Clone, Default)]
pub struct TableMeta {
    /// `(field, column)` pairs in declaration order.
    columns: Vec<(String, String)>,
    /// logical field -> physical column
    column_map: HashMap<String, String>,
    /// physical column -> logical field
    field_map: HashMap<String, String>,
}

impl TableMeta {
    /// Builds metadata from `(field, column)` pairs.
    pub fn new<F, C>(pairs: impl IntoIterator<Item = (F, C)>) -> Self
    where
        F: Into<String>,
        C: Into<String>,
    {
        let mut meta = Self::default();
        for (field, column) in pairs {
            let (field, column) = (field.into(), column.into());
            meta.column_map.insert(field.clone(), column.clone());
            meta.field_map.insert(column.clone(), field.clone());
            meta.columns.push((field, column));
        }
        meta
    }

    /// The physical column backing a logical field.
    pub fn column_of(&self, field: &str) -> Option<&str> {
        self.column_map.get(field).map(String::as_str)
    }

    /// The logical field exposed by a physical column.
    pub fn field_of(&self, column: &str) -> Option<&str> {
        self.field_map.get(column).map(String::as_str)
    }

    /// Returns `true` if `name` is a physical column of this table.
    pub fn has_column(&self, name: &str) -> bool {
        self.field_map.contains_key(name)
    }

    /// Returns `true` if `name` is either a logical field or a physical column.
    pub fn knows(&self, name: &str) -> bool {
        self.column_map.contains_key(name) || self.field_map.contains_key(name)
    }

    /// Iterates `(field, column)` pairs in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(f, c)| (f.as_str(), c.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Read-only registry of table metadata, keyed by physical table name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableMeta>,
}

#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    tables: HashMap<String, TableEntry>,
}

#[derive(Deserialize)]
struct TableEntry {
    #[serde(default)]
    columns: Vec<ColumnEntry>,
}

#[derive(Deserialize)]
struct ColumnEntry {
    field: String,
    column: String,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a table.
    pub fn register<F, C>(&mut self, table: impl Into<String>, pairs: impl IntoIterator<Item = (F, C)>)
    where
        F: Into<String>,
        C: Into<String>,
    {
        self.tables.insert(table.into(), TableMeta::new(pairs));
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_table<F, C>(mut self, table: impl Into<String>, pairs: impl IntoIterator<Item = (F, C)>) -> Self
    where
        F: Into<String>,
        C: Into<String>,
    {
        self.register(table, pairs);
        self
    }

    /// Looks up a table, failing with [`QuarryError::UnknownTable`].
    pub fn table(&self, name: &str) -> QuarryResult<&TableMeta> {
        self.tables
            .get(name)
            .ok_or_else(|| QuarryError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parses a schema document (see the module docs for the layout).
    pub fn from_toml_str(toml_str: &str) -> QuarryResult<Self> {
        let file: SchemaFile = toml::from_str(toml_str).map_err(|e| {
            QuarryError::ConfigurationError(format!("Failed to parse schema TOML: {e}"))
        })?;

        let mut registry = Self::new();
        for (table, entry) in file.tables {
            registry.register(table, entry.columns.into_iter().map(|c| (c.field, c.column)));
        }
        tracing::debug!(tables = registry.len(), "schema loaded");
        Ok(registry)
    }

    /// Reads and parses a schema file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> QuarryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            QuarryError::ConfigurationError(format!(
                "Failed to read schema file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads the schema file named by [`Settings::schema_file`].
    pub fn from_settings(settings: &Settings) -> QuarryResult<Self> {
        let path = settings.schema_file.as_deref().ok_or_else(|| {
            QuarryError::ConfigurationError("no schema_file configured".to_string())
        })?;
        Self::from_toml_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_meta() -> TableMeta {
        TableMeta::new([("id", "id"), ("userName", "user_name"), ("age", "age")])
    }

    #[test]
    fn test_table_meta_lookups() {
        let meta = user_meta();
        assert_eq!(meta.column_of("userName"), Some("user_name"));
        assert_eq!(meta.field_of("user_name"), Some("userName"));
        assert!(meta.has_column("user_name"));
        assert!(!meta.has_column("userName"));
        assert!(meta.knows("userName"));
        assert!(meta.knows("user_name"));
        assert!(!meta.knows("missing"));
    }

    #[test]
    fn test_table_meta_preserves_order() {
        let meta = user_meta();
        let cols: Vec<_> = meta.columns().map(|(_, c)| c).collect();
        assert_eq!(cols, vec!["id", "user_name", "age"]);
    }

    #[test]
    fn test_registry_unknown_table() {
        let registry = SchemaRegistry::new().with_table("user", [("id", "id")]);
        assert!(registry.contains("user"));
        assert!(registry.table("user").is_ok());
        let err = registry.table("order").unwrap_err();
        assert!(matches!(err, QuarryError::UnknownTable(ref t) if t == "order"));
    }

    #[test]
    fn test_registry_from_toml() {
        let toml = r#"
            [tables.user]
            columns = [
                { field = "id", column = "id" },
                { field = "userName", column = "user_name" },
            ]

            [tables.order]
            columns = [{ field = "userId", column = "user_id" }]
        "#;

        let registry = SchemaRegistry::from_toml_str(toml).unwrap();
        assert_eq!(registry.len(), 2);
        let user = registry.table("user").unwrap();
        assert_eq!(user.column_of("userName"), Some("user_name"));
        assert_eq!(
            registry.table("order").unwrap().column_of("userId"),
            Some("user_id")
        );
    }

    #[test]
    fn test_registry_from_toml_invalid() {
        let result = SchemaRegistry::from_toml_str("[tables.user]\ncolumns = 3");
        assert!(matches!(result, Err(QuarryError::ConfigurationError(_))));
    }

    #[test]
    fn test_registry_from_toml_file_missing() {
        let result = SchemaRegistry::from_toml_file("/nonexistent/schema.toml");
        assert!(matches!(result, Err(QuarryError::ConfigurationError(_))));
    }

    #[test]
    fn test_registry_from_settings() {
        let path = std::env::temp_dir().join(format!("quarry-schema-{}.toml", std::process::id()));
        std::fs::write(&path, "[tables.user]\ncolumns = [{ field = \"id\", column = \"id\" }]\n").unwrap();

        let settings = Settings {
            schema_file: Some(path.clone()),
            ..Settings::default()
        };
        let registry = SchemaRegistry::from_settings(&settings).unwrap();
        assert!(registry.contains("user"));
        std::fs::remove_file(&path).unwrap();

        let unset = SchemaRegistry::from_settings(&Settings::default());
        assert!(matches!(unset, Err(QuarryError::ConfigurationError(_))));
    }
}
