//! Schema reconciliation.
//!
//! During an upgrade the store's tables and indexes are brought in line with
//! a [`DatabaseConfig`]:
//!
//! - tables present in the store but not declared are dropped
//! - declared tables missing from the store are created with their key path
//! - per table, indexes for undeclared columns are dropped and every
//!   declared column (primary-key columns included) gets a non-unique index
//!
//! A declared key path that differs from the stored one fails the upgrade
//! with [`CoreError::Schema`]; key paths are never migrated.
//!
//! Reconciling twice against the same declaration changes nothing the
//! second time.

use crate::config::{DatabaseConfig, TableConfig};
use crate::error::{CoreError, CoreResult};
use crate::store::UpgradeTransaction;
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

/// A structural change applied during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// Created a table.
    CreateTable {
        /// Name of the table.
        table: String,
    },
    /// Dropped a table.
    DropTable {
        /// Name of the table.
        table: String,
    },
    /// Created an index.
    CreateIndex {
        /// Table the index is on.
        table: String,
        /// Name of the index.
        index: String,
    },
    /// Dropped an index.
    DropIndex {
        /// Table the index was on.
        table: String,
        /// Name of the index.
        index: String,
    },
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table } => write!(f, "create table {table}"),
            Self::DropTable { table } => write!(f, "drop table {table}"),
            Self::CreateIndex { table, index } => write!(f, "create index {table}.{index}"),
            Self::DropIndex { table, index } => write!(f, "drop index {table}.{index}"),
        }
    }
}

/// Reconciles store structure against declared schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaManager;

impl SchemaManager {
    /// Checks a declaration without touching the store.
    ///
    /// # Errors
    ///
    /// `SchemaError` if there are no tables, a table name repeats, or a
    /// table lacks a name, columns or primary key.
    pub fn validate(config: &DatabaseConfig) -> CoreResult<()> {
        if config.tables.is_empty() {
            return Err(CoreError::schema(format!(
                "database {} has no table configuration",
                config.name
            )));
        }
        let mut seen = BTreeSet::new();
        for table in &config.tables {
            Self::validate_table(&config.name, table)?;
            if !seen.insert(table.name.as_str()) {
                return Err(CoreError::schema(format!(
                    "table {} is declared twice in database {}",
                    table.name, config.name
                )));
            }
        }
        Ok(())
    }

    fn validate_table(database: &str, table: &TableConfig) -> CoreResult<()> {
        if table.name.trim().is_empty() {
            return Err(CoreError::schema(format!(
                "database {database} declares a table without a name"
            )));
        }
        if table.columns.is_empty() {
            return Err(CoreError::schema(format!(
                "table {} in database {database} has no column configuration",
                table.name
            )));
        }
        if table.primary_key.is_empty() {
            return Err(CoreError::schema(format!(
                "table {} in database {database} has no primary key configuration",
                table.name
            )));
        }
        Ok(())
    }

    /// Applies `config` to the store inside an upgrade.
    ///
    /// Returns the changes made, in the order they were applied.
    pub fn reconcile(
        txn: &mut UpgradeTransaction,
        config: &DatabaseConfig,
    ) -> CoreResult<Vec<SchemaChange>> {
        Self::validate(config)?;
        let mut changes = Vec::new();

        let declared: BTreeSet<&str> = config.tables.iter().map(|t| t.name.as_str()).collect();
        for table in txn.table_names() {
            if !declared.contains(table.as_str()) {
                txn.drop_table(&table)?;
                changes.push(SchemaChange::DropTable { table });
            }
        }

        for table in &config.tables {
            Self::reconcile_table(txn, table, &mut changes)?;
        }

        for change in &changes {
            info!(database = %config.name, version = config.version, %change, "schema change");
        }
        Ok(changes)
    }

    fn reconcile_table(
        txn: &mut UpgradeTransaction,
        table: &TableConfig,
        changes: &mut Vec<SchemaChange>,
    ) -> CoreResult<()> {
        let name = table.name.as_str();
        match txn.table(name).map(|t| t.key_path().clone()) {
            None => {
                txn.create_table(name, table.primary_key.clone())?;
                changes.push(SchemaChange::CreateTable {
                    table: name.to_string(),
                });
            }
            Some(existing) if existing != table.primary_key => {
                return Err(CoreError::schema(format!(
                    "table {name} is keyed by {existing}, cannot change key to {}",
                    table.primary_key
                )));
            }
            Some(_) => {}
        }

        let columns = table.all_columns();
        for index in txn.index_names(name)? {
            if !columns.contains(&index) {
                txn.drop_index(name, &index)?;
                changes.push(SchemaChange::DropIndex {
                    table: name.to_string(),
                    index,
                });
            }
        }

        let existing = txn.index_names(name)?;
        for column in columns {
            if !existing.contains(&column) {
                txn.create_index(name, &column, &column, false)?;
                changes.push(SchemaChange::CreateIndex {
                    table: name.to_string(),
                    index: column,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::key::KeyPath;
    use crate::store::{StoreFactory, TransactionMode};
    use keyshelf_codec::{Record, Value};

    fn v1() -> DatabaseConfig {
        DatabaseConfig::new("app", 1).table(TableConfig::new("t", "a").columns(["a", "b"]))
    }

    fn apply(factory: &StoreFactory, config: &DatabaseConfig) -> CoreResult<Vec<SchemaChange>> {
        let mut changes = Vec::new();
        factory.open(&config.name, config.version, |up| {
            changes = SchemaManager::reconcile(up, config)?;
            Ok(())
        })?;
        Ok(changes)
    }

    fn create_index(index: &str) -> SchemaChange {
        SchemaChange::CreateIndex {
            table: "t".into(),
            index: index.into(),
        }
    }

    #[test]
    fn creates_tables_and_indexes() {
        let factory = StoreFactory::new();
        let changes = apply(&factory, &v1()).unwrap();
        assert_eq!(
            changes,
            vec![
                SchemaChange::CreateTable { table: "t".into() },
                create_index("a"),
                create_index("b"),
            ]
        );
    }

    #[test]
    fn alters_indexes_on_upgrade() {
        let factory = StoreFactory::new();
        apply(&factory, &v1()).unwrap();

        let v2 = DatabaseConfig::new("app", 2).table(TableConfig::new("t", "a").columns(["a", "c"]));
        let changes = apply(&factory, &v2).unwrap();
        assert_eq!(
            changes,
            vec![
                SchemaChange::DropIndex {
                    table: "t".into(),
                    index: "b".into()
                },
                create_index("c"),
            ]
        );
        assert_eq!(factory.describe("app").unwrap().tables[0].indexes, vec!["a", "c"]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let factory = StoreFactory::new();
        apply(&factory, &v1()).unwrap();
        let mut again = v1();
        again.version = 2;
        assert!(apply(&factory, &again).unwrap().is_empty());
    }

    #[test]
    fn drops_undeclared_tables() {
        let factory = StoreFactory::new();
        let config = v1().table(TableConfig::new("old", "id").column("x"));
        apply(&factory, &config).unwrap();

        let v2 = DatabaseConfig::new("app", 2).table(TableConfig::new("t", "a").columns(["a", "b"]));
        let changes = apply(&factory, &v2).unwrap();
        assert_eq!(changes, vec![SchemaChange::DropTable { table: "old".into() }]);
        assert_eq!(factory.table_names("app").unwrap(), vec!["t"]);
    }

    #[test]
    fn primary_key_column_added() {
        let factory = StoreFactory::new();
        let config = DatabaseConfig::new("app", 1)
            .table(TableConfig::new("m", KeyPath::composite(["team", "id"])).column("name"));
        apply(&factory, &config).unwrap();
        let info = factory.describe("app").unwrap();
        assert_eq!(info.tables[0].indexes, vec!["id", "name", "team"]);
    }

    #[test]
    fn validation_errors() {
        let no_tables = DatabaseConfig::new("app", 1);
        assert_eq!(SchemaManager::validate(&no_tables).unwrap_err().kind(), ErrorKind::Schema);

        let no_columns = DatabaseConfig::new("app", 1).table(TableConfig::new("t", "id"));
        assert_eq!(SchemaManager::validate(&no_columns).unwrap_err().kind(), ErrorKind::Schema);

        let no_key = DatabaseConfig::new("app", 1)
            .table(TableConfig::new("t", KeyPath::Composite(vec![])).column("a"));
        assert_eq!(SchemaManager::validate(&no_key).unwrap_err().kind(), ErrorKind::Schema);

        let twice = v1().table(TableConfig::new("t", "a").column("a"));
        assert_eq!(SchemaManager::validate(&twice).unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn key_path_is_immutable() {
        let factory = StoreFactory::new();
        apply(&factory, &v1()).unwrap();
        let v2 = DatabaseConfig::new("app", 2).table(TableConfig::new("t", "b").columns(["a", "b"]));
        assert_eq!(apply(&factory, &v2).unwrap_err().kind(), ErrorKind::Schema);
        // Failed upgrade leaves the store at the old version
        assert_eq!(factory.version("app"), Some(1));
    }

    #[test]
    fn transaction_begun_before_upgrade_cannot_undo_it() {
        let factory = StoreFactory::new();
        apply(&factory, &v1()).unwrap();
        let mut stale = factory.begin("app", ["t"], TransactionMode::ReadWrite).unwrap();
        let mut row = Record::new();
        row.insert("a".into(), Value::Integer(1));
        row.insert("b".into(), Value::Integer(2));
        stale.add("t", row).unwrap();

        let v2 = DatabaseConfig::new("app", 2).table(TableConfig::new("t", "a").columns(["a", "c"]));
        apply(&factory, &v2).unwrap();

        assert_eq!(stale.commit().unwrap_err().kind(), ErrorKind::Storage);
        let info = factory.describe("app").unwrap();
        assert_eq!(info.version, 2);
        assert_eq!(info.tables[0].indexes, vec!["a", "c"]);
        assert_eq!(info.tables[0].records, 0);
    }
}
