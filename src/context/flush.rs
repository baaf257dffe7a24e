use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, trace, warn};

use crate::context::options::Options;
use crate::core::{ConsistencyLevel, CqlMapError, Result};
use crate::session::ResultSet;
use crate::statement::{BatchStatement, Statement, StatementDao};

#[derive(Debug, Default)]
struct BatchState {
    statements: Vec<Statement>,
    counter_statements: Vec<Statement>,
    consistency: Option<ConsistencyLevel>,
    read_consistency: Option<ConsistencyLevel>,
    last_timestamp: i64,
}

/// Pending statements of one open batch.
pub struct BatchingFlushContext {
    dao: Arc<StatementDao>,
    force_ordering: bool,
    state: Mutex<BatchState>,
}

impl BatchingFlushContext {
    pub fn new(dao: Arc<StatementDao>, force_ordering: bool) -> Self {
        Self {
            dao,
            force_ordering,
            state: Mutex::new(BatchState::default()),
        }
    }

    fn push(&self, statement: Statement) -> Result<()> {
        let mut state = self.state.lock()?;
        if statement.is_counter() {
            state.counter_statements.push(statement);
            return Ok(());
        }
        // A literal USING TIMESTAMP from the caller wins over batch ordering.
        let statement = if self.force_ordering && statement.query().timestamp.is_none() {
            // Strictly increasing so the server keeps push order.
            let timestamp = Utc::now().timestamp_micros().max(state.last_timestamp + 1);
            state.last_timestamp = timestamp;
            statement.with_timestamp(timestamp)
        } else {
            statement
        };
        trace!("Batch: pending '{}'", statement.cql());
        state.statements.push(statement);
        Ok(())
    }

    fn start(&self, read: Option<ConsistencyLevel>, write: Option<ConsistencyLevel>) -> Result<()> {
        let mut state = self.state.lock()?;
        state.statements.clear();
        state.counter_statements.clear();
        state.read_consistency = read;
        state.consistency = write;
        Ok(())
    }

    fn take(&self) -> Result<(Vec<Statement>, Vec<Statement>, Option<ConsistencyLevel>)> {
        let mut state = self.state.lock()?;
        state.read_consistency = None;
        Ok((
            std::mem::take(&mut state.statements),
            std::mem::take(&mut state.counter_statements),
            state.consistency.take(),
        ))
    }

    async fn end(&self, default_level: ConsistencyLevel) -> Result<()> {
        // Pending lists are emptied before execution, so a failure leaves nothing behind.
        let (statements, counter_statements, consistency) = self.take()?;
        let consistency = consistency.unwrap_or(default_level);
        debug!(
            "Ending batch: {} statements, {} counter statements at {}",
            statements.len(),
            counter_statements.len(),
            consistency
        );

        if !statements.is_empty() {
            self.dao
                .execute_batch(&BatchStatement {
                    statements,
                    consistency,
                    counter: false,
                })
                .await?;
        }
        if !counter_statements.is_empty() {
            self.dao
                .execute_batch(&BatchStatement {
                    statements: counter_statements,
                    consistency,
                    counter: true,
                })
                .await?;
        }
        Ok(())
    }

    fn clean_up(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        let discarded = state.statements.len() + state.counter_statements.len();
        if discarded > 0 {
            warn!("Discarding {} pending batch statements", discarded);
        }
        state.statements.clear();
        state.counter_statements.clear();
        state.consistency = None;
        state.read_consistency = None;
        Ok(())
    }

    fn pending(&self) -> Result<usize> {
        let state = self.state.lock()?;
        Ok(state.statements.len() + state.counter_statements.len())
    }

    fn consistency(&self) -> Result<Option<ConsistencyLevel>> {
        Ok(self.state.lock()?.consistency)
    }

    fn read_consistency(&self) -> Result<Option<ConsistencyLevel>> {
        Ok(self.state.lock()?.read_consistency)
    }
}

/// Decides whether pushed statements run now or at the end of a batch.
#[derive(Clone)]
pub enum FlushContext {
    Immediate(Arc<StatementDao>),
    Batching(Arc<BatchingFlushContext>),
}

impl FlushContext {
    pub fn immediate(dao: Arc<StatementDao>) -> Self {
        Self::Immediate(dao)
    }

    pub fn batching(dao: Arc<StatementDao>, force_ordering: bool) -> Self {
        Self::Batching(Arc::new(BatchingFlushContext::new(dao, force_ordering)))
    }

    pub fn dao(&self) -> &Arc<StatementDao> {
        match self {
            Self::Immediate(dao) => dao,
            Self::Batching(batch) => &batch.dao,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batching(_))
    }

    /// Executes now and returns the result, or queues and returns `None`.
    pub async fn push(&self, statement: Statement) -> Result<Option<ResultSet>> {
        match self {
            Self::Immediate(dao) => dao.execute(&statement).await.map(Some),
            Self::Batching(batch) => {
                batch.push(statement)?;
                Ok(None)
            }
        }
    }

    /// Statements are executed on push in immediate mode and on `end_batch`
    /// in batch mode, so there is nothing left to do here.
    pub async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Opens a batch; the levels stay fixed until it ends or is cleaned up.
    pub fn start_batch(
        &self,
        read: Option<ConsistencyLevel>,
        write: Option<ConsistencyLevel>,
    ) -> Result<()> {
        match self {
            Self::Immediate(_) => Err(not_batching("start")),
            Self::Batching(batch) => {
                debug!("Starting batch, read level {:?}, write level {:?}", read, write);
                batch.start(read, write)
            }
        }
    }

    /// Runs every pending statement in push order under one consistency level.
    pub async fn end_batch(&self, default_level: ConsistencyLevel) -> Result<()> {
        match self {
            Self::Immediate(_) => Err(not_batching("end")),
            Self::Batching(batch) => batch.end(default_level).await,
        }
    }

    pub fn clean_up(&self) -> Result<()> {
        match self {
            Self::Immediate(_) => Ok(()),
            Self::Batching(batch) => batch.clean_up(),
        }
    }

    /// Rejects a per-call consistency level while batching; the batch is aborted first.
    pub fn check_options(&self, options: &Options) -> Result<()> {
        match (self, options.consistency) {
            (Self::Batching(batch), Some(level)) => {
                batch.clean_up()?;
                Err(CqlMapError::Usage(format!(
                    "Runtime custom Consistency Level {} cannot be set for batch mode. Please set the Consistency Levels at batch start with 'start_batch_with_consistency(read_level, write_level)'",
                    level
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn pending(&self) -> Result<usize> {
        match self {
            Self::Immediate(_) => Ok(0),
            Self::Batching(batch) => batch.pending(),
        }
    }

    /// Write level fixed at batch start, if any.
    pub fn batch_write_level(&self) -> Result<Option<ConsistencyLevel>> {
        match self {
            Self::Immediate(_) => Ok(None),
            Self::Batching(batch) => batch.consistency(),
        }
    }

    /// Read level fixed at batch start, if any.
    pub fn batch_read_level(&self) -> Result<Option<ConsistencyLevel>> {
        match self {
            Self::Immediate(_) => Ok(None),
            Self::Batching(batch) => batch.read_consistency(),
        }
    }
}

fn not_batching(action: &str) -> CqlMapError {
    CqlMapError::Usage(format!("Cannot {} a batch outside batch mode", action))
}
