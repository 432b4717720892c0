//! Startup wiring: initialise configured databases and hand out
//! coordinators and DAOs.

use crate::config::DatabaseConfig;
use crate::coordinator::TransactionCoordinator;
use crate::dao::TableDao;
use crate::error::{CoreError, CoreResult};
use crate::repository::{Repository, StoreRepository};
use crate::schema::SchemaChange;
use crate::store::StoreFactory;
use std::sync::Arc;
use tracing::info;

/// The configured persistence layer.
///
/// # Example
///
/// ```rust,ignore
/// let persistence = Persistence::open(StoreFactory::new(), vec![config])?;
/// let users = persistence.dao("app", "user")?;
/// let id = persistence.transaction(None, ["user"], |c| users.add(c, record))?;
/// ```
#[derive(Debug)]
pub struct Persistence {
    repository: Arc<StoreRepository>,
    configs: Vec<DatabaseConfig>,
}

impl Persistence {
    /// Initialises every configured database on `factory`.
    ///
    /// Databases whose configured version is above the stored one are
    /// upgraded through the schema manager, then all are opened.
    pub fn open(factory: StoreFactory, configs: Vec<DatabaseConfig>) -> CoreResult<Self> {
        let repository = Arc::new(StoreRepository::new(factory));
        for config in &configs {
            let changes = repository.init_database(config)?;
            if !changes.is_empty() {
                info!(
                    database = %config.name,
                    changes = %describe(&changes),
                    "schema reconciled"
                );
            }
        }
        Ok(Self {
            repository,
            configs,
        })
    }

    /// The shared repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<StoreRepository> {
        &self.repository
    }

    /// The database declarations.
    #[must_use]
    pub fn configs(&self) -> &[DatabaseConfig] {
        &self.configs
    }

    /// A new coordinator over the shared repository.
    #[must_use]
    pub fn coordinator(&self) -> TransactionCoordinator {
        TransactionCoordinator::new(Arc::clone(&self.repository))
    }

    fn config(&self, database: &str) -> CoreResult<&DatabaseConfig> {
        self.configs
            .iter()
            .find(|c| c.name == database)
            .ok_or_else(|| CoreError::schema(format!("database {database} is not configured")))
    }

    /// DAO for a configured table.
    pub fn dao(&self, database: &str, table: &str) -> CoreResult<TableDao> {
        TableDao::new(self.config(database)?, table)
    }

    /// Resolves the database a transaction runs against.
    ///
    /// Without a name this is the only configured database.
    pub fn resolve_database<'a>(&'a self, database: Option<&'a str>) -> CoreResult<&'a str> {
        match (database, self.configs.as_slice()) {
            (Some(name), _) => Ok(name),
            (None, [only]) => Ok(&only.name),
            (None, _) => Err(CoreError::invalid_argument(format!(
                "{} databases are configured, name the one to use",
                self.configs.len()
            ))),
        }
    }

    /// Runs `f` in a transaction over `tables`.
    ///
    /// Commits when `f` returns `Ok`, aborts when it returns `Err`.
    pub fn transaction<F, T, I, S>(&self, database: Option<&str>, tables: I, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut TransactionCoordinator) -> CoreResult<T>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let database = self.resolve_database(database)?;
        let mut coordinator = self.coordinator();
        coordinator.run(database, tables, f)
    }

    /// Closes every configured database.
    pub fn close(&self) {
        for config in &self.configs {
            self.repository.close(&config.name);
        }
    }
}

fn describe(changes: &[SchemaChange]) -> String {
    changes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
