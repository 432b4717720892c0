//! Query executor: range scans, ordering, pagination and projection.

use super::condition::Condition;
use super::order::Order;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyRange;
use crate::store::{Direction, Source, Transaction};
use keyshelf_codec::{Record, Value};
use tracing::{debug, warn};

/// Column projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Columns {
    /// Every stored column (`*`).
    #[default]
    All,
    /// Only these columns; others are dropped from results.
    Only(Vec<String>),
}

impl Columns {
    /// Projection onto `columns`.
    pub fn only<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(columns.into_iter().map(Into::into).collect())
    }

    /// Applies the projection to a record.
    #[must_use]
    pub fn project(&self, record: &Record) -> Record {
        match self {
            Self::All => record.clone(),
            Self::Only(columns) => record
                .iter()
                .filter(|(k, _)| columns.iter().any(|c| c == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// A select request.
///
/// `start` and `size` are kept as given; negative or absent values are
/// normalized when the query runs (start 0, size unbounded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    /// Column projection.
    pub columns: Columns,
    /// Filter.
    pub condition: Option<Condition>,
    /// Traversal order.
    pub order: Option<Order>,
    /// Records to skip.
    pub start: Option<i64>,
    /// Maximum records to return.
    pub size: Option<i64>,
}

impl SelectQuery {
    /// Every record, every column.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Sets the projection.
    #[must_use]
    pub fn columns(mut self, columns: Columns) -> Self {
        self.columns = columns;
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Sets the order.
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Normalized pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Page {
    start: usize,
    size: Option<usize>,
}

impl Page {
    fn new(start: Option<i64>, size: Option<i64>) -> Self {
        Self {
            start: start
                .filter(|s| *s > 0)
                .and_then(|s| usize::try_from(s).ok())
                .unwrap_or(0),
            size: size
                .filter(|s| *s > 0)
                .and_then(|s| usize::try_from(s).ok()),
        }
    }

    /// Skips `start` items, then takes up to `size`, pulling no further.
    fn take<'a, I>(self, items: I) -> Vec<&'a Record>
    where
        I: Iterator<Item = &'a Record>,
    {
        let items = items.skip(self.start);
        match self.size {
            Some(size) => items.take(size).collect(),
            None => items.collect(),
        }
    }
}

/// Picks the cursor source for scanning `column`.
///
/// The column's index if there is one; otherwise the primary key when the
/// table is keyed by that single column.
pub(crate) fn source_for(txn: &Transaction, table: &str, column: &str) -> CoreResult<Source> {
    if txn.has_index(table, column)? {
        return Ok(Source::Index(column.to_string()));
    }
    if txn.key_path(table)?.single() == Some(column) {
        return Ok(Source::PrimaryKey);
    }
    Err(CoreError::index_not_found(table, column))
}

fn plan<'q>(
    txn: &Transaction,
    table: &str,
    query: &'q SelectQuery,
) -> CoreResult<(Source, Option<&'q KeyRange>, Direction)> {
    let direction = query.order.as_ref().map_or(Direction::Next, Order::direction);
    if let Some(condition) = &query.condition {
        if let Some(range) = condition.key_range() {
            let source = source_for(txn, table, condition.column())?;
            return Ok((source, Some(range), direction));
        }
    }
    if let Some(order) = &query.order {
        return Ok((source_for(txn, table, order.column())?, None, direction));
    }
    Ok((Source::PrimaryKey, None, Direction::Next))
}

/// Runs a select.
///
/// A range condition scans its column's index over the range; otherwise an
/// order scans its column's index; otherwise the primary key is scanned.
/// Substring conditions cannot narrow the scan: every record is visited,
/// matches are collected and the page is cut from the matches.
pub fn select(txn: &Transaction, table: &str, query: &SelectQuery) -> CoreResult<Vec<Record>> {
    let page = Page::new(query.start, query.size);
    let (source, range, direction) = plan(txn, table, query)?;
    debug!(table, ?source, %direction, ?page, "select scan");

    let cursor = txn.open_cursor(table, &source, range, direction)?;
    let collected = match &query.condition {
        Some(condition) if condition.is_like() => {
            let matches: Vec<&Record> = cursor
                .map(|entry| entry.value)
                .filter(|record| condition.matches(record))
                .collect();
            debug!(table, matches = matches.len(), "substring scan complete");
            page.take(matches.into_iter())
        }
        _ => page.take(cursor.map(|entry| entry.value)),
    };

    Ok(collected
        .into_iter()
        .map(|record| query.columns.project(record))
        .collect())
}

/// Point lookup by primary key.
pub fn select_by_primary_key(
    txn: &Transaction,
    table: &str,
    columns: &Columns,
    key: &Value,
) -> CoreResult<Option<Record>> {
    Ok(txn.get(table, key)?.map(|record| columns.project(record)))
}

/// Counts records matching `condition` (all records without one).
///
/// Failures are logged and reported as 0.
pub fn count(txn: &Transaction, table: &str, condition: Option<&Condition>) -> u64 {
    match try_count(txn, table, condition) {
        Ok(n) => n,
        Err(e) => {
            warn!(table, error = %e, "count failed, reporting 0");
            0
        }
    }
}

fn try_count(txn: &Transaction, table: &str, condition: Option<&Condition>) -> CoreResult<u64> {
    let Some(condition) = condition else {
        return txn.count(table, None);
    };
    match condition.key_range() {
        Some(range) => match source_for(txn, table, condition.column())? {
            Source::Index(index) => txn.index_count(table, &index, Some(range)),
            Source::PrimaryKey => txn.count(table, Some(range)),
        },
        None => {
            let cursor = txn.open_cursor(table, &Source::PrimaryKey, None, Direction::Next)?;
            Ok(cursor.filter(|entry| condition.matches(entry.value)).count() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPath;
    use crate::store::{StoreFactory, TransactionMode};

    fn user(id: i64, name: &str, age: i64) -> Record {
        let mut r = Record::new();
        r.insert("id".into(), Value::Integer(id));
        r.insert("name".into(), Value::from(name));
        r.insert("age".into(), Value::Integer(age));
        r
    }

    fn txn() -> Transaction {
        let factory = StoreFactory::new();
        factory
            .open("app", 1, |up| {
                up.create_table("user", KeyPath::from("id"))?;
                for column in ["id", "name", "age"] {
                    up.create_index("user", column, column, false)?;
                }
                up.create_table("bare", KeyPath::from("id"))
            })
            .unwrap();
        let mut txn = factory
            .begin("app", ["user", "bare"], TransactionMode::ReadWrite)
            .unwrap();
        for (id, name, age) in [
            (1, "Anna", 30),
            (2, "Bob", 20),
            (3, "Hannah", 40),
            (4, "Cid", 25),
            (5, "Dan", 30),
        ] {
            txn.add("user", user(id, name, age)).unwrap();
        }
        txn
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records
            .iter()
            .map(|r| r.get("id").and_then(Value::as_integer).unwrap())
            .collect()
    }

    #[test]
    fn page_normalization() {
        assert_eq!(Page::new(None, None), Page { start: 0, size: None });
        assert_eq!(Page::new(Some(-3), Some(0)), Page { start: 0, size: None });
        assert_eq!(Page::new(Some(2), Some(-1)), Page { start: 2, size: None });
        assert_eq!(Page::new(Some(2), Some(5)), Page { start: 2, size: Some(5) });
    }

    #[test]
    fn full_scan_in_key_order() {
        let txn = txn();
        let all = select(&txn, "user", &SelectQuery::all()).unwrap();
        assert_eq!(ids(&all), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn range_with_order() {
        let txn = txn();
        let query = SelectQuery::all()
            .filter(Condition::greater_or_equal("age", 25).unwrap())
            .order(Order::descending("age", false));
        assert_eq!(ids(&select(&txn, "user", &query).unwrap()), vec![3, 5, 1, 4]);
    }

    #[test]
    fn order_only() {
        let txn = txn();
        let query = SelectQuery::all().order(Order::ascending("age", true));
        assert_eq!(ids(&select(&txn, "user", &query).unwrap()), vec![2, 4, 1, 3]);
    }

    #[test]
    fn pagination() {
        let txn = txn();
        let query = SelectQuery::all().order(Order::ascending("age", false));
        let page = select(&txn, "user", &query.clone().start(1).size(2)).unwrap();
        assert_eq!(ids(&page), vec![4, 1]);
        let tail = select(&txn, "user", &query.clone().start(3)).unwrap();
        assert_eq!(ids(&tail), vec![5, 3]);
        let past = select(&txn, "user", &query.start(10)).unwrap();
        assert!(past.is_empty());
    }

    #[test]
    fn like_paginates_matches() {
        let txn = txn();
        let query = SelectQuery::all().filter(Condition::like("name", "n").unwrap());
        // Anna, Hannah, Dan
        assert_eq!(ids(&select(&txn, "user", &query).unwrap()), vec![1, 3, 5]);
        let page = select(&txn, "user", &query.clone().start(1).size(1)).unwrap();
        assert_eq!(ids(&page), vec![3]);

        let ordered = query.order(Order::descending("age", false));
        assert_eq!(ids(&select(&txn, "user", &ordered).unwrap()), vec![3, 5, 1]);
    }

    #[test]
    fn like_tests_unprojected_column() {
        let txn = txn();
        let query = SelectQuery::all()
            .columns(Columns::only(["id"]))
            .filter(Condition::like("name", "nn").unwrap());
        let rows = select(&txn, "user", &query).unwrap();
        assert_eq!(ids(&rows), vec![1, 3]);
        assert!(rows.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn projection() {
        let txn = txn();
        let found = select_by_primary_key(
            &txn,
            "user",
            &Columns::only(["name", "missing"]),
            &Value::Integer(2),
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("name"), Some(&Value::from("Bob")));
        assert!(select_by_primary_key(&txn, "user", &Columns::All, &Value::Integer(9))
            .unwrap()
            .is_none());
    }

    #[test]
    fn primary_key_fallback() {
        let mut txn = txn();
        for id in 1..=3 {
            let mut r = Record::new();
            r.insert("id".into(), Value::Integer(id));
            txn.add("bare", r).unwrap();
        }
        let query = SelectQuery::all().filter(Condition::greater_than("id", 1).unwrap());
        assert_eq!(ids(&select(&txn, "bare", &query).unwrap()), vec![2, 3]);

        let query = SelectQuery::all().order(Order::descending("other", false));
        assert!(matches!(
            select(&txn, "bare", &query),
            Err(CoreError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn counting() {
        let txn = txn();
        assert_eq!(count(&txn, "user", None), 5);
        let c = Condition::equals("age", 30).unwrap();
        assert_eq!(count(&txn, "user", Some(&c)), 2);
        let c = Condition::like("name", "nn").unwrap();
        assert_eq!(count(&txn, "user", Some(&c)), 2);
        // Failures degrade to zero
        assert_eq!(count(&txn, "nope", None), 0);
        let c = Condition::equals("unknown", 1).unwrap();
        assert_eq!(count(&txn, "user", Some(&c)), 0);
    }
}
