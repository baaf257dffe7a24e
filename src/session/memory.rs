use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use log::trace;
use tokio::sync::{Mutex, RwLock};

use crate::core::{ConsistencyLevel, CqlMapError, Result, Value};
use crate::session::{ResultSet, Row, Session};
use crate::statement::{
    BatchStatement, BindSlot, ClusteringColumn, Clause, PreparedStatement, Query, QueryKind,
    SortDirection, Statement,
};

/// One statement as seen by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub cql: String,
    pub prepared: bool,
    pub consistency: ConsistencyLevel,
    pub values: Vec<Value>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedBatch {
    pub consistency: ConsistencyLevel,
    pub counter: bool,
    pub statements: Vec<ExecutedStatement>,
}

#[derive(Debug, Clone)]
struct StoredRow {
    key: Vec<Value>,
    columns: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct MemoryTable {
    partition_key: Vec<String>,
    clustering_key: Vec<ClusteringColumn>,
    rows: Vec<StoredRow>,
}

impl MemoryTable {
    fn new(query: &Query) -> Self {
        Self {
            partition_key: query.partition_key.clone(),
            clustering_key: query.clustering_key.clone(),
            rows: Vec::new(),
        }
    }

    fn key_names(&self) -> impl Iterator<Item = &str> {
        self.partition_key
            .iter()
            .map(String::as_str)
            .chain(self.clustering_key.iter().map(|c| c.name.as_str()))
    }

    /// Natural storage order of two rows of the same partition.
    fn compare_clustering(&self, left: &StoredRow, right: &StoredRow) -> Ordering {
        let offset = self.partition_key.len();
        for (index, column) in self.clustering_key.iter().enumerate() {
            let (Some(a), Some(b)) = (left.key.get(offset + index), right.key.get(offset + index))
            else {
                break;
            };
            let ordering = a.compare(b).unwrap_or(Ordering::Equal);
            let ordering = if column.reversed { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn upsert(&mut self, key: Vec<Value>, columns: Vec<(String, Value)>) -> &mut StoredRow {
        let index = match self.rows.iter().position(|row| row.key == key) {
            Some(index) => index,
            None => {
                self.rows.push(StoredRow {
                    key,
                    columns: BTreeMap::new(),
                });
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[index];
        for (name, value) in columns {
            if value.is_null() {
                row.columns.remove(&name);
            } else {
                row.columns.insert(name, value);
            }
        }
        row
    }

    fn to_row(&self, stored: &StoredRow, selected: &[String]) -> Row {
        let mut columns = BTreeMap::new();
        if selected.is_empty() {
            for (name, value) in self.key_names().zip(stored.key.iter()) {
                columns.insert(name.to_string(), value.clone());
            }
            columns.extend(stored.columns.clone());
        } else {
            for name in selected {
                let value = match self.key_names().position(|key| key == name) {
                    Some(index) => stored.key.get(index).cloned(),
                    None => stored.columns.get(name).cloned(),
                };
                if let Some(value) = value {
                    columns.insert(name.clone(), value);
                }
            }
        }
        Row::new(columns)
    }
}

#[derive(Default)]
struct Bindings {
    columns: Vec<(String, Value)>,
    keys: HashMap<String, Value>,
    slice_start: Vec<Value>,
    slice_end: Vec<Value>,
    delta: i64,
    limit: Option<i64>,
}

impl Bindings {
    fn bind(query: &Query, values: &[Value]) -> Result<Self> {
        let slots = query.bind_slots();
        if slots.len() != values.len() {
            return Err(CqlMapError::Driver(format!(
                "Statement '{}' expects {} values, got {}",
                query.to_cql(),
                slots.len(),
                values.len()
            )));
        }

        let mut bindings = Self::default();
        if let Some(Clause::Literal(limit)) = query.limit {
            bindings.limit = Some(limit);
        }
        for (slot, value) in slots.into_iter().zip(values.iter().cloned()) {
            match slot {
                BindSlot::Column(name) => bindings.columns.push((name, value)),
                BindSlot::Key(name) => {
                    bindings.keys.insert(name, value);
                }
                BindSlot::SliceStart(_) => bindings.slice_start.push(value),
                BindSlot::SliceEnd(_) => bindings.slice_end.push(value),
                BindSlot::Delta => bindings.delta = value.as_i64().unwrap_or(0),
                BindSlot::Limit => bindings.limit = value.as_i64(),
                BindSlot::Ttl | BindSlot::Timestamp => {}
            }
        }
        Ok(bindings)
    }

    /// Full primary key, taken from the restricted keys or the written columns.
    fn full_key(&mut self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let mut key = Vec::new();
        for name in query.key_columns() {
            let value = match self.keys.remove(name) {
                Some(value) => value,
                None => match self.columns.iter().position(|(column, _)| column == name) {
                    Some(index) => self.columns.remove(index).1,
                    None => Value::Null,
                },
            };
            if value.is_null() {
                return Err(CqlMapError::Driver(format!(
                    "Missing value for primary key column '{}' of table '{}'",
                    name, table
                )));
            }
            key.push(value);
        }
        Ok(key)
    }
}

/// In-process wide-column store implementing [`Session`].
///
/// Tables are created on first write from the key layout of the statement.
/// Every prepare, statement and batch is recorded for inspection.
#[derive(Default)]
pub struct MemorySession {
    tables: RwLock<HashMap<String, Arc<RwLock<MemoryTable>>>>,
    executed: Mutex<Vec<ExecutedStatement>>,
    batches: Mutex<Vec<ExecutedBatch>>,
    fail_next: Mutex<Option<String>>,
    next_prepared_id: AtomicU64,
    prepared: AtomicUsize,
    requests: AtomicUsize,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `prepare` calls received.
    pub fn prepared_count(&self) -> usize {
        self.prepared.load(AtomicOrdering::SeqCst)
    }

    /// Number of requests received: single statements plus batches.
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    /// Statements executed outside a batch, in order.
    pub async fn executed(&self) -> Vec<ExecutedStatement> {
        self.executed.lock().await.clone()
    }

    pub async fn batches(&self) -> Vec<ExecutedBatch> {
        self.batches.lock().await.clone()
    }

    pub async fn clear_log(&self) {
        self.executed.lock().await.clear();
        self.batches.lock().await.clear();
        self.requests.store(0, AtomicOrdering::SeqCst);
    }

    /// Makes the next request fail with a driver error.
    pub async fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock().await = Some(message.into());
    }

    /// All rows of a table, key columns included.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let handle = match self.tables.read().await.get(table) {
            Some(handle) => handle.clone(),
            None => return Vec::new(),
        };
        let table = handle.read().await;
        table.rows.iter().map(|row| table.to_row(row, &[])).collect()
    }

    async fn check_failure(&self) -> Result<()> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        match self.fail_next.lock().await.take() {
            Some(message) => Err(CqlMapError::Driver(message)),
            None => Ok(()),
        }
    }

    async fn table_for(&self, query: &Query, create: bool) -> Option<Arc<RwLock<MemoryTable>>> {
        if let Some(table) = self.tables.read().await.get(&query.table) {
            return Some(table.clone());
        }
        if !create {
            return None;
        }
        let mut tables = self.tables.write().await;
        Some(
            tables
                .entry(query.table.clone())
                .or_insert_with(|| Arc::new(RwLock::new(MemoryTable::new(query))))
                .clone(),
        )
    }

    async fn apply(&self, statement: &Statement) -> Result<ResultSet> {
        let query = statement.query();
        let mut bindings = Bindings::bind(query, &statement.values)?;

        let Some(handle) = self.table_for(query, query.is_write()).await else {
            return Ok(ResultSet::empty());
        };
        let mut table = handle.write().await;

        match query.kind {
            QueryKind::Insert | QueryKind::Update => {
                let key = bindings.full_key(&query.table, query)?;
                table.upsert(key, bindings.columns);
                Ok(ResultSet::empty())
            }
            QueryKind::Increment | QueryKind::Decrement => {
                let key = bindings.full_key(&query.table, query)?;
                for column in &query.columns {
                    let row = table.upsert(key.clone(), Vec::new());
                    let current = row.columns.get(column).and_then(Value::as_i64).unwrap_or(0);
                    let updated = if query.kind == QueryKind::Increment {
                        current.checked_add(bindings.delta)
                    } else {
                        current.checked_sub(bindings.delta)
                    };
                    let updated = updated.ok_or_else(|| {
                        CqlMapError::Driver(format!("Counter '{}' overflowed", column))
                    })?;
                    row.columns.insert(column.clone(), Value::Bigint(updated));
                }
                Ok(ResultSet::empty())
            }
            QueryKind::Delete => {
                let prefix = restricted_prefix(query, &bindings)?;
                table.rows.retain(|row| !row.key.starts_with(&prefix));
                Ok(ResultSet::empty())
            }
            QueryKind::Select => {
                let prefix = restricted_prefix(query, &bindings)?;
                let offset = table.partition_key.len();
                let mut rows: Vec<&StoredRow> = table
                    .rows
                    .iter()
                    .filter(|row| row.key.starts_with(&prefix))
                    .filter(|row| {
                        within_bound(row, offset, &bindings.slice_start, Ordering::Less)
                            && within_bound(row, offset, &bindings.slice_end, Ordering::Greater)
                    })
                    .collect();

                rows.sort_by(|a, b| table.compare_clustering(a, b));
                if let Some((column, direction)) = &query.ordering {
                    let declared = match table.clustering_key.iter().find(|c| &c.name == column) {
                        Some(c) if c.reversed => SortDirection::Desc,
                        _ => SortDirection::Asc,
                    };
                    if *direction != declared {
                        rows.reverse();
                    }
                }
                if let Some(limit) = bindings.limit {
                    rows.truncate(usize::try_from(limit).unwrap_or(0));
                }

                Ok(ResultSet::new(
                    rows.into_iter()
                        .map(|row| table.to_row(row, &query.columns))
                        .collect(),
                ))
            }
        }
    }

    fn record(statement: &Statement) -> ExecutedStatement {
        ExecutedStatement {
            cql: statement.cql(),
            prepared: statement.is_prepared(),
            consistency: statement.consistency,
            values: statement.values.clone(),
            timestamp: statement.timestamp,
        }
    }
}

/// Values of the equality-restricted key columns, in key order.
fn restricted_prefix(query: &Query, bindings: &Bindings) -> Result<Vec<Value>> {
    let restricted = query
        .partition_key
        .iter()
        .chain(
            query
                .clustering_key
                .iter()
                .take(query.restricted_clustering)
                .map(|c| &c.name),
        );
    restricted
        .map(|name| {
            bindings.keys.get(name).cloned().ok_or_else(|| {
                CqlMapError::Driver(format!("Missing value for key column '{}'", name))
            })
        })
        .collect()
}

/// Whether the row's leading clustering values are not on the `outside` side of the bound.
fn within_bound(row: &StoredRow, offset: usize, bound: &[Value], outside: Ordering) -> bool {
    if bound.is_empty() {
        return true;
    }
    let end = (offset + bound.len()).min(row.key.len());
    let prefix = Value::Tuple(row.key[offset..end].to_vec());
    let bound = Value::Tuple(bound.to_vec());
    prefix.compare(&bound).map(|o| o != outside).unwrap_or(false)
}

#[async_trait]
impl Session for MemorySession {
    async fn prepare(&self, query: &Query) -> Result<PreparedStatement> {
        self.prepared.fetch_add(1, AtomicOrdering::SeqCst);
        let id = self.next_prepared_id.fetch_add(1, AtomicOrdering::SeqCst);
        let cql = query.to_cql();
        trace!("Prepared statement #{}: {}", id, cql);
        Ok(PreparedStatement {
            id,
            query: query.clone(),
            cql,
        })
    }

    async fn execute(&self, statement: &Statement) -> Result<ResultSet> {
        self.check_failure().await?;
        self.executed.lock().await.push(Self::record(statement));
        self.apply(statement).await
    }

    async fn execute_batch(&self, batch: &BatchStatement) -> Result<()> {
        self.check_failure().await?;
        for statement in &batch.statements {
            self.apply(statement).await?;
        }
        self.batches.lock().await.push(ExecutedBatch {
            consistency: batch.consistency,
            counter: batch.counter,
            statements: batch.statements.iter().map(Self::record).collect(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_key() -> (Vec<String>, Vec<ClusteringColumn>) {
        (
            vec!["user_id".to_string()],
            vec![ClusteringColumn {
                name: "name".to_string(),
                reversed: false,
            }],
        )
    }

    async fn insert(session: &MemorySession, user_id: i64, name: &str, age: i64) {
        let (pk, ck) = users_key();
        let query = Query::insert(
            "users",
            pk,
            ck,
            vec!["user_id".to_string(), "name".to_string(), "age".to_string()],
        );
        let statement = Statement::simple(
            query,
            vec![Value::Bigint(user_id), Value::from(name), Value::Bigint(age)],
            ConsistencyLevel::One,
        );
        session.execute(&statement).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_then_select_by_key() {
        let session = MemorySession::new();
        insert(&session, 1, "alice", 30).await;

        let (pk, ck) = users_key();
        let select = Statement::simple(
            Query::select("users", pk, ck, vec!["age".to_string()]),
            vec![Value::Bigint(1), Value::from("alice")],
            ConsistencyLevel::One,
        );
        let rows = session.execute(&select).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0].get("age"), Value::Bigint(30));
        assert_eq!(session.request_count(), 2);
    }

    #[tokio::test]
    async fn test_slice_select_orders_and_limits() {
        let session = MemorySession::new();
        for (name, age) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            insert(&session, 1, name, age).await;
        }
        insert(&session, 2, "a", 9).await;

        let (pk, ck) = users_key();
        let select = Statement::simple(
            Query::select("users", pk, ck, Vec::new())
                .restrict_clustering(0)
                .slice(1, 1)
                .order_by("name", SortDirection::Desc)
                .limit(Clause::Literal(2)),
            vec![Value::Bigint(1), Value::from("b"), Value::from("d")],
            ConsistencyLevel::One,
        );
        let rows = session.execute(&select).await.unwrap();
        let names: Vec<Value> = rows.rows.iter().map(|row| row.get("name")).collect();
        assert_eq!(names, vec![Value::from("d"), Value::from("c")]);
    }

    #[tokio::test]
    async fn test_counter_increment_creates_row() {
        let session = MemorySession::new();
        let query = Query::increment("counters", vec!["id".to_string()], Vec::new(), "value");
        let statement = Statement::simple(
            query.clone(),
            vec![Value::Bigint(5), Value::Bigint(1)],
            ConsistencyLevel::One,
        );
        session.execute(&statement).await.unwrap();
        session.execute(&statement).await.unwrap();

        let rows = session.rows("counters").await;
        assert_eq!(rows[0].get("value"), Value::Bigint(10));
    }

    #[tokio::test]
    async fn test_injected_failure_surfaces_once() {
        let session = MemorySession::new();
        session.fail_next("unavailable").await;
        let (pk, ck) = users_key();
        let select = Statement::simple(
            Query::select("users", pk, ck, Vec::new()),
            vec![Value::Bigint(1), Value::from("a")],
            ConsistencyLevel::One,
        );
        assert!(matches!(
            session.execute(&select).await,
            Err(CqlMapError::Driver(_))
        ));
        assert!(session.execute(&select).await.unwrap().is_empty());
    }
}
