use std::sync::Arc;

use log::trace;

use crate::context::PersistenceContext;
use crate::core::{ConsistencyLevel, CqlMapError, Result};
use crate::metadata::PropertyMeta;
use crate::statement::CounterOperation;

/// Handle on one counter column of a managed record.
///
/// Every call is one request to the store. Values are never cached, so a
/// read always reflects the writes that preceded it.
#[derive(Clone)]
pub struct CounterHandle {
    context: PersistenceContext,
    property: Arc<PropertyMeta>,
}

impl CounterHandle {
    pub(crate) fn new(context: PersistenceContext, property: Arc<PropertyMeta>) -> Self {
        Self { context, property }
    }

    pub fn property_name(&self) -> &str {
        &self.property.property_name
    }

    pub async fn get(&self) -> Result<Option<i64>> {
        self.context.get_counter(&self.property, None).await
    }

    pub async fn get_with_consistency(&self, level: ConsistencyLevel) -> Result<Option<i64>> {
        self.context.get_counter(&self.property, Some(checked(level)?)).await
    }

    pub async fn incr(&self) -> Result<()> {
        self.incr_by(1).await
    }

    pub async fn incr_by(&self, delta: i64) -> Result<()> {
        trace!("Increment counter '{}' by {}", self.property.property_name, delta);
        self.context
            .update_counter(&self.property, CounterOperation::Incr, delta, None)
            .await
    }

    pub async fn incr_by_with_consistency(
        &self,
        delta: i64,
        level: ConsistencyLevel,
    ) -> Result<()> {
        let level = checked(level)?;
        self.context
            .update_counter(&self.property, CounterOperation::Incr, delta, Some(level))
            .await
    }

    pub async fn decr(&self) -> Result<()> {
        self.decr_by(1).await
    }

    pub async fn decr_by(&self, delta: i64) -> Result<()> {
        trace!("Decrement counter '{}' by {}", self.property.property_name, delta);
        self.context
            .update_counter(&self.property, CounterOperation::Decr, delta, None)
            .await
    }

    pub async fn decr_by_with_consistency(
        &self,
        delta: i64,
        level: ConsistencyLevel,
    ) -> Result<()> {
        let level = checked(level)?;
        self.context
            .update_counter(&self.property, CounterOperation::Decr, delta, Some(level))
            .await
    }
}

fn checked(level: ConsistencyLevel) -> Result<ConsistencyLevel> {
    if level.is_valid_for_counter() {
        Ok(level)
    } else {
        Err(CqlMapError::Usage(format!(
            "Consistency level {} is not supported for counters",
            level
        )))
    }
}
