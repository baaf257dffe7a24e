pub mod memory;

pub use memory::{ExecutedBatch, ExecutedStatement, MemorySession};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::{Result, Value};
use crate::statement::{BatchStatement, PreparedStatement, Query, Statement};

/// Execute capability of the underlying driver.
#[async_trait]
pub trait Session: Send + Sync {
    async fn prepare(&self, query: &Query) -> Result<PreparedStatement>;

    async fn execute(&self, statement: &Statement) -> Result<ResultSet>;

    async fn execute_batch(&self, batch: &BatchStatement) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(columns: BTreeMap<String, Value>) -> Self {
        Self { columns }
    }

    /// Column value; a missing column reads as `Null`.
    pub fn get(&self, column: &str) -> Value {
        self.columns.get(column).cloned().unwrap_or(Value::Null)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
