use std::any::Any;
use std::sync::Arc;

use log::trace;

use crate::config::ObjectCodec;
use crate::context::flush::FlushContext;
use crate::context::options::Options;
use crate::core::{ConsistencyLevel, CqlMapError, Result, Value};
use crate::metadata::{EntityMeta, PropertyMeta};
use crate::session::Row;
use crate::statement::{
    BoundValues, CounterOperation, SortDirection, StatementDao, StatementGenerator,
};

/// State of one unit of work on one record: its key, its metadata, the
/// active flush context and the per-call options.
#[derive(Clone)]
pub struct PersistenceContext {
    meta: Arc<EntityMeta>,
    primary_key: Value,
    flush: FlushContext,
    options: Options,
}

impl PersistenceContext {
    pub fn new(
        meta: Arc<EntityMeta>,
        primary_key: Value,
        flush: FlushContext,
        options: Options,
    ) -> Self {
        Self {
            meta,
            primary_key,
            flush,
            options,
        }
    }

    pub fn meta(&self) -> &Arc<EntityMeta> {
        &self.meta
    }

    pub fn primary_key(&self) -> &Value {
        &self.primary_key
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn flush_context(&self) -> &FlushContext {
        &self.flush
    }

    fn dao(&self) -> &StatementDao {
        self.flush.dao()
    }

    pub fn codec(&self) -> &dyn ObjectCodec {
        self.dao().codec()
    }

    /// Per-call override, then the batch level, then the property level,
    /// then the type default.
    pub fn read_level(&self, property: Option<&PropertyMeta>) -> Result<ConsistencyLevel> {
        let level = match self.options.consistency {
            Some(level) => level,
            None => match self.flush.batch_read_level()? {
                Some(level) => level,
                None => property.map_or(self.meta.read_level, |p| p.read_level),
            },
        };
        trace!(
            "Read level for '{}'{}: {}",
            self.meta.table_name,
            property.map(|p| format!(".{}", p.property_name)).unwrap_or_default(),
            level
        );
        Ok(level)
    }

    pub fn write_level(&self, property: Option<&PropertyMeta>) -> Result<ConsistencyLevel> {
        let level = match self.options.consistency {
            Some(level) => level,
            None => match self.flush.batch_write_level()? {
                Some(level) => level,
                None => property.map_or(self.meta.write_level, |p| p.write_level),
            },
        };
        trace!(
            "Write level for '{}'{}: {}",
            self.meta.table_name,
            property.map(|p| format!(".{}", p.property_name)).unwrap_or_default(),
            level
        );
        Ok(level)
    }

    /// Write level of a multi-field update: the shared property level, or
    /// the type default when the fields disagree.
    fn write_level_for(&self, fields: &[Arc<PropertyMeta>]) -> Result<ConsistencyLevel> {
        match fields.split_first() {
            Some((first, rest)) if rest.iter().all(|f| f.write_level == first.write_level) => {
                self.write_level(Some(first))
            }
            _ => self.write_level(None),
        }
    }

    pub async fn push_insert(&self, entity: &(dyn Any + Send + Sync)) -> Result<()> {
        let statement = self.dao().insert_statement(
            &self.meta,
            entity,
            &self.primary_key,
            self.options.ttl,
            self.options.timestamp,
            self.write_level(None)?,
        )?;
        self.flush.push(statement).await?;
        Ok(())
    }

    pub async fn push_update(
        &self,
        entity: &(dyn Any + Send + Sync),
        fields: &[Arc<PropertyMeta>],
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let statement = self
            .dao()
            .update_statement(
                &self.meta,
                entity,
                &self.primary_key,
                fields,
                self.options.ttl,
                self.options.timestamp,
                self.write_level_for(fields)?,
            )
            .await?;
        self.flush.push(statement).await?;
        Ok(())
    }

    pub async fn push_removal(&self) -> Result<()> {
        let statement = self
            .dao()
            .removal_statement(&self.meta, &self.primary_key, self.write_level(None)?)?;
        self.flush.push(statement).await?;
        Ok(())
    }

    /// Queues an increment of a simple counter, as part of a persist.
    pub async fn push_simple_counter_increment(
        &self,
        property: &PropertyMeta,
        delta: i64,
    ) -> Result<()> {
        let statement = self.dao().simple_counter_statement(
            CounterOperation::Incr,
            &self.meta,
            property,
            &self.primary_key,
            delta,
            self.write_level(Some(property))?,
        )?;
        self.flush.push(statement).await?;
        Ok(())
    }

    pub async fn push_simple_counter_deletion(&self, property: &PropertyMeta) -> Result<()> {
        let statement = self.dao().simple_counter_statement(
            CounterOperation::Delete,
            &self.meta,
            property,
            &self.primary_key,
            0,
            self.write_level(Some(property))?,
        )?;
        self.flush.push(statement).await?;
        Ok(())
    }

    pub async fn push_clustered_counter_increment(
        &self,
        property: &PropertyMeta,
        delta: i64,
    ) -> Result<()> {
        let statement = self.dao().clustered_counter_statement(
            CounterOperation::Incr,
            &self.meta,
            property,
            &self.primary_key,
            delta,
            self.write_level(Some(property))?,
        )?;
        self.flush.push(statement).await?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.flush.flush().await
    }

    pub async fn load_entity(&self) -> Result<Option<Row>> {
        self.dao()
            .load_entity(&self.meta, &self.primary_key, self.read_level(None)?)
            .await
    }

    pub async fn load_property(&self, property: &PropertyMeta) -> Result<Option<Row>> {
        let level = self.read_level(Some(property))?;
        self.dao()
            .load_property(&self.meta, property, &self.primary_key, level)
            .await
    }

    /// Applies `operation` by `delta` to a counter right away, whatever the
    /// flush mode. A negative delta runs the opposite operation.
    pub async fn update_counter(
        &self,
        property: &PropertyMeta,
        operation: CounterOperation,
        delta: i64,
        level: Option<ConsistencyLevel>,
    ) -> Result<()> {
        let (operation, amount) = counter_amount(operation, delta)?;
        let level = match level {
            Some(level) => level,
            None => self.write_level(Some(property))?,
        };
        let statement = if self.meta.clustered_counter {
            self.dao().clustered_counter_statement(
                operation,
                &self.meta,
                property,
                &self.primary_key,
                amount,
                level,
            )?
        } else {
            self.dao().simple_counter_statement(
                operation,
                &self.meta,
                property,
                &self.primary_key,
                amount,
                level,
            )?
        };
        self.dao().execute(&statement).await?;
        Ok(())
    }

    pub async fn get_counter(
        &self,
        property: &PropertyMeta,
        level: Option<ConsistencyLevel>,
    ) -> Result<Option<i64>> {
        let level = match level {
            Some(level) => level,
            None => self.read_level(Some(property))?,
        };
        if self.meta.clustered_counter {
            self.dao()
                .get_clustered_counter(&self.meta, property, &self.primary_key, level)
                .await
        } else {
            self.dao()
                .get_simple_counter(&self.meta, property, &self.primary_key, level)
                .await
        }
    }

    /// One range read within the partition of `partition_key`.
    pub async fn slice(
        &self,
        partition_key: Vec<Value>,
        start: Vec<Value>,
        end: Vec<Value>,
        ordering: Option<SortDirection>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>> {
        let embedded = self.meta.id_meta.embedded_id.as_ref().ok_or_else(|| {
            CqlMapError::Usage(format!(
                "Slice queries need a compound primary key; entity '{}' has a simple one",
                self.meta.type_name
            ))
        })?;
        if partition_key.len() != embedded.partition_components.len() {
            return Err(CqlMapError::Usage(format!(
                "Entity '{}' expects {} partition components, got {}",
                self.meta.type_name,
                embedded.partition_components.len(),
                partition_key.len()
            )));
        }
        let clustering = embedded.clustering_components.len();
        if start.len() > clustering || end.len() > clustering {
            return Err(CqlMapError::Usage(format!(
                "Slice bounds of entity '{}' accept at most {} clustering components",
                self.meta.type_name, clustering
            )));
        }
        let query = StatementGenerator::slice(&self.meta, start.len(), end.len(), ordering, limit);
        let values = BoundValues::new()
            .columns(
                embedded
                    .partition_components
                    .iter()
                    .map(|c| c.name.clone())
                    .zip(partition_key),
            )
            .slice_start(start)
            .slice_end(end);
        self.dao()
            .slice(query, values, self.read_level(None)?)
            .await
    }

    /// Context for another record of the same type within the same flush context.
    pub fn duplicate(&self, primary_key: Value) -> Self {
        Self {
            primary_key,
            ..self.clone()
        }
    }
}

/// Normalizes a counter update to a non-negative amount.
fn counter_amount(operation: CounterOperation, delta: i64) -> Result<(CounterOperation, i64)> {
    if delta >= 0 {
        return Ok((operation, delta));
    }
    let opposite = match operation {
        CounterOperation::Incr => CounterOperation::Decr,
        CounterOperation::Decr => CounterOperation::Incr,
        other => {
            return Err(CqlMapError::Usage(format!(
                "Counter operation {:?} takes no amount",
                other
            )));
        }
    };
    let amount = delta.checked_neg().ok_or_else(|| {
        CqlMapError::Usage(format!("Counter delta {} is out of range", delta))
    })?;
    Ok((opposite, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_amount_flips_negative_delta() {
        let (operation, amount) = counter_amount(CounterOperation::Incr, -3).unwrap();
        assert_eq!(operation, CounterOperation::Decr);
        assert_eq!(amount, 3);

        let (operation, amount) = counter_amount(CounterOperation::Decr, i64::MAX).unwrap();
        assert_eq!(operation, CounterOperation::Decr);
        assert_eq!(amount, i64::MAX);
    }

    #[test]
    fn test_counter_amount_rejects_minimum() {
        for operation in [CounterOperation::Incr, CounterOperation::Decr] {
            let err = counter_amount(operation, i64::MIN).unwrap_err();
            assert!(matches!(err, CqlMapError::Usage(_)));
        }
    }
}
