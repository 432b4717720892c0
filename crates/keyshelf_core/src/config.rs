//! Schema configuration.
//!
//! A [`DatabaseConfig`] declares the tables, columns and primary keys a
//! database should have at a given version. The schema manager reconciles
//! the store against it whenever the version increases.

use crate::key::KeyPath;
use serde::{Deserialize, Serialize};

/// Declared schema of one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name.
    pub name: String,
    /// Schema version. Raising it triggers an upgrade on the next open.
    pub version: u64,
    /// Declared tables.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl DatabaseConfig {
    /// Creates a database declaration with no tables.
    #[must_use]
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
            tables: Vec::new(),
        }
    }

    /// Adds a table declaration.
    #[must_use]
    pub fn table(mut self, table: TableConfig) -> Self {
        self.tables.push(table);
        self
    }

    /// Looks up a declared table by name.
    #[must_use]
    pub fn table_config(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Names of all declared tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Declared schema of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name.
    pub name: String,
    /// Declared columns. Each becomes a non-unique index.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Primary key column(s).
    pub primary_key: KeyPath,
}

impl TableConfig {
    /// Creates a table declaration with no columns.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: impl Into<KeyPath>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: primary_key.into(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Adds several columns.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declared columns with any missing primary-key column appended.
    #[must_use]
    pub fn all_columns(&self) -> Vec<String> {
        let mut columns = self.columns.clone();
        for key_column in self.primary_key.columns() {
            if !columns.iter().any(|c| c == key_column) {
                columns.push(key_column.to_string());
            }
        }
        columns
    }

    /// Returns true if `column` is declared or part of the primary key.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column) || self.primary_key.contains(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_pattern() {
        let config = DatabaseConfig::new("app", 2)
            .table(TableConfig::new("user", "id").columns(["name", "age"]))
            .table(TableConfig::new("membership", vec!["group", "user"]).column("role"));

        assert_eq!(config.version, 2);
        assert_eq!(config.table_names(), vec!["user", "membership"]);
        assert!(config.table_config("user").is_some());
        assert!(config.table_config("missing").is_none());
    }

    #[test]
    fn all_columns_appends_primary_key() {
        let table = TableConfig::new("user", "id").columns(["name", "age"]);
        assert_eq!(table.all_columns(), vec!["name", "age", "id"]);

        let table = TableConfig::new("user", "id").columns(["id", "name"]);
        assert_eq!(table.all_columns(), vec!["id", "name"]);

        let table = TableConfig::new("m", vec!["group", "user"]).column("user");
        assert_eq!(table.all_columns(), vec!["user", "group"]);
    }

    #[test]
    fn has_column_includes_key() {
        let table = TableConfig::new("user", "id").column("name");
        assert!(table.has_column("id"));
        assert!(table.has_column("name"));
        assert!(!table.has_column("age"));
    }
}
