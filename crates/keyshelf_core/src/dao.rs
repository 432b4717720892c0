//! Per-table CRUD facade over the transaction coordinator.

use crate::config::{DatabaseConfig, TableConfig};
use crate::coordinator::{Action, TransactionCoordinator};
use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use crate::query::{Columns, Condition, Order, SelectQuery};
use crate::repository::Repository;
use keyshelf_codec::{Record, Value};

/// A filter given either typed or in the string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConditionArg {
    /// No filter.
    #[default]
    None,
    /// A built condition.
    Typed(Condition),
    /// String form, see [`Condition::parse`].
    Text(String),
}

impl ConditionArg {
    fn resolve(self) -> CoreResult<Option<Condition>> {
        match self {
            Self::None => Ok(None),
            Self::Typed(condition) => Ok(Some(condition)),
            Self::Text(text) => Condition::parse(&text),
        }
    }
}

impl From<Condition> for ConditionArg {
    fn from(condition: Condition) -> Self {
        Self::Typed(condition)
    }
}

impl From<Option<Condition>> for ConditionArg {
    fn from(condition: Option<Condition>) -> Self {
        condition.map_or(Self::None, Self::Typed)
    }
}

impl From<&str> for ConditionArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ConditionArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// An order given either typed or in the string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrderArg {
    /// Natural primary key order.
    #[default]
    None,
    /// A built order.
    Typed(Order),
    /// String form, see [`Order::parse`].
    Text(String),
}

impl OrderArg {
    fn resolve(self) -> Option<Order> {
        match self {
            Self::None => None,
            Self::Typed(order) => Some(order),
            Self::Text(text) => Order::parse(&text),
        }
    }
}

impl From<Order> for OrderArg {
    fn from(order: Order) -> Self {
        Self::Typed(order)
    }
}

impl From<Option<Order>> for OrderArg {
    fn from(order: Option<Order>) -> Self {
        order.map_or(Self::None, Self::Typed)
    }
}

impl From<&str> for OrderArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for OrderArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// CRUD operations on one configured table.
///
/// Every call runs in the coordinator's current transaction. Validation
/// failures (missing ids, undeclared columns) abort that transaction
/// through [`TransactionCoordinator::throw_exception`].
#[derive(Debug, Clone)]
pub struct TableDao {
    database: String,
    table: TableConfig,
}

impl TableDao {
    /// DAO for `table` as declared in `config`.
    pub fn new(config: &DatabaseConfig, table: &str) -> CoreResult<Self> {
        let table = config.table_config(table).cloned().ok_or_else(|| {
            CoreError::schema(format!(
                "table {table} is not configured in database {}",
                config.name
            ))
        })?;
        Ok(Self {
            database: config.name.clone(),
            table,
        })
    }

    /// Database the table belongs to.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table.name
    }

    /// Primary key path.
    #[must_use]
    pub fn primary_key(&self) -> &KeyPath {
        &self.table.primary_key
    }

    fn check_column<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        column: &str,
    ) -> CoreResult<()> {
        if self.table.has_column(column) {
            Ok(())
        } else {
            Err(coordinator.throw_exception(format!(
                "column {column} is not declared in table {}",
                self.table.name
            )))
        }
    }

    fn check_id<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        id: &Value,
    ) -> CoreResult<()> {
        if id.is_null() {
            Err(coordinator.throw_exception(format!(
                "an id is required for table {}",
                self.table.name
            )))
        } else {
            Ok(())
        }
    }

    fn split<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        record: Record,
    ) -> CoreResult<(Vec<String>, Vec<Value>)> {
        for column in record.keys() {
            self.check_column(coordinator, column)?;
        }
        Ok(record.into_iter().unzip())
    }

    /// Fetches a record by primary key.
    pub fn get_by_id<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        id: impl Into<Value>,
    ) -> CoreResult<Option<Record>> {
        let id = id.into();
        self.check_id(coordinator, &id)?;
        coordinator
            .execute(
                &self.table.name,
                Action::SelectByPrimaryKey {
                    columns: Columns::All,
                    key: id,
                },
            )?
            .into_record()
    }

    /// Selects records by condition and order, paged by `start`/`size`.
    pub fn get_list_by_conditions<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        condition: impl Into<ConditionArg>,
        order: impl Into<OrderArg>,
        start: Option<i64>,
        size: Option<i64>,
    ) -> CoreResult<Vec<Record>> {
        let condition = match condition.into().resolve() {
            Ok(condition) => condition,
            Err(e) => {
                coordinator.abort()?;
                return Err(e);
            }
        };
        let order = order.into().resolve();
        if let Some(condition) = &condition {
            self.check_column(coordinator, condition.column())?;
        }
        if let Some(order) = &order {
            self.check_column(coordinator, order.column())?;
        }
        let query = SelectQuery {
            columns: Columns::All,
            condition,
            order,
            start,
            size,
        };
        coordinator
            .execute(&self.table.name, Action::Select(query))?
            .into_records()
    }

    /// Every record in `order`.
    pub fn get_all_list<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        order: impl Into<OrderArg>,
    ) -> CoreResult<Vec<Record>> {
        self.get_list_by_conditions(coordinator, ConditionArg::None, order, None, None)
    }

    /// Counts records matching `condition`.
    pub fn get_count_by_conditions<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        condition: impl Into<ConditionArg>,
    ) -> CoreResult<u64> {
        let condition = match condition.into().resolve() {
            Ok(condition) => condition,
            Err(e) => {
                coordinator.abort()?;
                return Err(e);
            }
        };
        if let Some(condition) = &condition {
            self.check_column(coordinator, condition.column())?;
        }
        coordinator
            .execute(&self.table.name, Action::Count { condition })?
            .into_count()
    }

    /// Counts every record.
    pub fn get_all_count<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
    ) -> CoreResult<u64> {
        self.get_count_by_conditions(coordinator, ConditionArg::None)
    }

    /// Inserts a record; a missing single-column key is generated.
    pub fn add<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        record: Record,
    ) -> CoreResult<Value> {
        let (columns, values) = self.split(coordinator, record)?;
        coordinator
            .execute(&self.table.name, Action::Add { columns, values })?
            .into_key()
    }

    /// Overwrites the record with the same primary key.
    pub fn update<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        record: Record,
    ) -> CoreResult<Value> {
        let has_key = self
            .table
            .primary_key
            .columns()
            .iter()
            .all(|c| record.get(*c).is_some_and(|v| !v.is_null()));
        if !has_key {
            return Err(coordinator.throw_exception(format!(
                "primary key {} is required to update table {}",
                self.table.primary_key, self.table.name
            )));
        }
        let (columns, values) = self.split(coordinator, record)?;
        coordinator
            .execute(&self.table.name, Action::Update { columns, values })?
            .into_key()
    }

    /// Deletes the record with primary key `id`.
    pub fn delete<R: Repository>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        id: impl Into<Value>,
    ) -> CoreResult<Record> {
        let id = id.into();
        self.check_id(coordinator, &id)?;
        let Some(column) = self.table.primary_key.single() else {
            return Err(coordinator.throw_exception(format!(
                "table {} has a composite primary key, delete by id is not supported",
                self.table.name
            )));
        };
        let condition = match Condition::equals(column, id) {
            Ok(condition) => condition,
            Err(e) => {
                coordinator.abort()?;
                return Err(e);
            }
        };
        coordinator
            .execute(
                &self.table.name,
                Action::Delete {
                    condition: Some(condition),
                },
            )?
            .into_deleted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::repository::StoreRepository;
    use crate::store::StoreFactory;
    use std::sync::Arc;

    fn config() -> DatabaseConfig {
        DatabaseConfig::new("app", 1)
            .table(TableConfig::new("user", "id").columns(["name", "age"]))
            .table(TableConfig::new("member", KeyPath::composite(["team", "id"])).column("role"))
    }

    fn setup() -> (TableDao, TransactionCoordinator) {
        let repo = StoreRepository::new(StoreFactory::new());
        repo.init_database(&config()).unwrap();
        let mut coordinator = TransactionCoordinator::new(Arc::new(repo));
        coordinator.start("app", ["user", "member"]).unwrap();
        (TableDao::new(&config(), "user").unwrap(), coordinator)
    }

    fn user(name: &str, age: i64) -> Record {
        let mut r = Record::new();
        r.insert("name".into(), Value::from(name));
        r.insert("age".into(), Value::Integer(age));
        r
    }

    #[test]
    fn unknown_table() {
        assert_eq!(
            TableDao::new(&config(), "nope").unwrap_err().kind(),
            ErrorKind::Schema
        );
    }

    #[test]
    fn add_get_update_delete() {
        let (dao, mut c) = setup();
        let id = dao.add(&mut c, user("Ann", 30)).unwrap();
        let found = dao.get_by_id(&mut c, id.clone()).unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::from("Ann")));

        let mut changed = found.clone();
        changed.insert("age".into(), Value::Integer(31));
        dao.update(&mut c, changed).unwrap();
        assert_eq!(
            dao.get_by_id(&mut c, id.clone()).unwrap().unwrap().get("age"),
            Some(&Value::Integer(31))
        );

        let removed = dao.delete(&mut c, id.clone()).unwrap();
        assert_eq!(removed.get("age"), Some(&Value::Integer(31)));
        assert!(dao.get_by_id(&mut c, id).unwrap().is_none());
    }

    #[test]
    fn list_with_string_forms() {
        let (dao, mut c) = setup();
        for (name, age) in [("A", 20), ("B", 25), ("C", 30), ("D", 40)] {
            dao.add(&mut c, user(name, age)).unwrap();
        }
        let rows = dao
            .get_list_by_conditions(&mut c, "age >= 25", "age desc", Some(1), Some(2))
            .unwrap();
        let ages: Vec<_> = rows.iter().map(|r| r.get("age").cloned().unwrap()).collect();
        assert_eq!(ages, vec![Value::Integer(30), Value::Integer(25)]);

        assert_eq!(dao.get_all_list(&mut c, "age asc").unwrap().len(), 4);
        assert_eq!(dao.get_count_by_conditions(&mut c, "age < 30").unwrap(), 2);
        assert_eq!(dao.get_all_count(&mut c).unwrap(), 4);
        // Malformed strings mean no filter
        assert_eq!(dao.get_count_by_conditions(&mut c, "age ~ 3").unwrap(), 4);
    }

    #[test]
    fn validation_aborts() {
        let (dao, mut c) = setup();
        dao.add(&mut c, user("Ann", 30)).unwrap();
        let err = dao.get_by_id(&mut c, Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);
        assert!(!c.is_active());

        c.start("app", ["user"]).unwrap();
        assert_eq!(dao.get_all_count(&mut c).unwrap(), 0);
        let mut bad = user("Bob", 1);
        bad.insert("email".into(), Value::from("b@x"));
        assert_eq!(dao.add(&mut c, bad).unwrap_err().kind(), ErrorKind::Aborted);

        c.start("app", ["user"]).unwrap();
        let err = dao.update(&mut c, user("NoId", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);

        c.start("app", ["user"]).unwrap();
        let err = dao
            .get_list_by_conditions(&mut c, "email = x", OrderArg::None, None, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);
    }

    #[test]
    fn composite_delete_is_rejected() {
        let (_, mut c) = setup();
        let dao = TableDao::new(&config(), "member").unwrap();
        let mut r = Record::new();
        r.insert("team".into(), Value::from("red"));
        r.insert("id".into(), Value::Integer(1));
        let key = dao.add(&mut c, r).unwrap();
        assert!(dao.get_by_id(&mut c, key.clone()).unwrap().is_some());
        assert_eq!(dao.delete(&mut c, key).unwrap_err().kind(), ErrorKind::Aborted);
    }
}
