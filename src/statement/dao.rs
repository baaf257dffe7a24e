use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};

use crate::config::{ConfigurationContext, ObjectCodec};
use crate::core::{ConsistencyLevel, CqlMapError, Result, Value};
use crate::metadata::{EntityMeta, EntityMetaRegistry, PropertyMeta};
use crate::session::{ResultSet, Row, Session};
use crate::statement::binder::{self, BoundValues};
use crate::statement::cache::CacheManager;
use crate::statement::generator::{
    COUNTER_FQCN, COUNTER_PRIMARY_KEY, COUNTER_PROPERTY_NAME, COUNTER_VALUE, CounterOperation,
    StatementGenerator,
};
use crate::statement::query::{BatchStatement, PreparedStatement, Query, Statement};

#[derive(Debug)]
struct ClusteredCounterStatements {
    incr: HashMap<String, Arc<PreparedStatement>>,
    decr: HashMap<String, Arc<PreparedStatement>>,
    select: HashMap<String, Arc<PreparedStatement>>,
}

/// Prepared statements of fixed shapes plus the variable-shape cache,
/// bound to one session.
pub struct StatementDao {
    session: Arc<dyn Session>,
    codec: Arc<dyn ObjectCodec>,
    insert_pss: HashMap<TypeId, Arc<PreparedStatement>>,
    select_eager_pss: HashMap<TypeId, Arc<PreparedStatement>>,
    remove_pss: HashMap<String, Arc<PreparedStatement>>,
    counter_pss: HashMap<CounterOperation, Arc<PreparedStatement>>,
    clustered_counter_pss: HashMap<TypeId, ClusteredCounterStatements>,
    cache: CacheManager,
}

impl StatementDao {
    /// Prepares the fixed statements of every registered type.
    pub async fn bootstrap(
        session: Arc<dyn Session>,
        registry: &EntityMetaRegistry,
        config: &ConfigurationContext,
    ) -> Result<Self> {
        let mut dao = Self {
            session,
            codec: config.object_codec.clone(),
            insert_pss: HashMap::new(),
            select_eager_pss: HashMap::new(),
            remove_pss: HashMap::new(),
            counter_pss: HashMap::new(),
            clustered_counter_pss: HashMap::new(),
            cache: CacheManager::new(config.prepared_statements_cache_size)?,
        };

        for meta in registry.iter() {
            debug!("Preparing statements for entity '{}'", meta.type_name);
            if meta.clustered_counter {
                let mut statements = ClusteredCounterStatements {
                    incr: HashMap::new(),
                    decr: HashMap::new(),
                    select: HashMap::new(),
                };
                for property in meta.counter_metas() {
                    let name = property.property_name.clone();
                    let query = |operation| {
                        StatementGenerator::clustered_counter(meta, property, operation)
                    };
                    statements.incr.insert(
                        name.clone(),
                        dao.prepare(&query(CounterOperation::Incr)).await?,
                    );
                    statements.decr.insert(
                        name.clone(),
                        dao.prepare(&query(CounterOperation::Decr)).await?,
                    );
                    statements.select.insert(
                        name,
                        dao.prepare(&query(CounterOperation::Select)).await?,
                    );
                }
                dao.clustered_counter_pss.insert(meta.type_id, statements);
            } else {
                let insert = dao.prepare(&StatementGenerator::insert(meta)).await?;
                dao.insert_pss.insert(meta.type_id, insert);
            }

            let select = dao.prepare(&StatementGenerator::select_eager(meta)).await?;
            dao.select_eager_pss.insert(meta.type_id, select);
            let remove = dao.prepare(&StatementGenerator::delete(meta)).await?;
            dao.remove_pss.insert(meta.table_name.clone(), remove);
        }

        if registry.iter().any(|meta| meta.has_simple_counter()) {
            for operation in CounterOperation::ALL {
                let prepared = dao.prepare(&StatementGenerator::simple_counter(operation)).await?;
                dao.counter_pss.insert(operation, prepared);
            }
        }

        Ok(dao)
    }

    async fn prepare(&self, query: &Query) -> Result<Arc<PreparedStatement>> {
        Ok(Arc::new(self.session.prepare(query).await?))
    }

    pub fn codec(&self) -> &dyn ObjectCodec {
        self.codec.as_ref()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    fn fixed<'a, K: std::hash::Hash + Eq>(
        map: &'a HashMap<K, Arc<PreparedStatement>>,
        key: &K,
        what: &str,
        meta: &EntityMeta,
    ) -> Result<&'a Arc<PreparedStatement>> {
        map.get(key).ok_or_else(|| {
            CqlMapError::BeanMapping(format!(
                "Cannot find prepared statement for {} for table '{}'",
                what, meta.table_name
            ))
        })
    }

    pub fn insert_statement(
        &self,
        meta: &EntityMeta,
        entity: &dyn Any,
        primary_key: &Value,
        ttl: Option<i32>,
        timestamp: Option<i64>,
        consistency: ConsistencyLevel,
    ) -> Result<Statement> {
        let columns =
            binder::entity_columns(meta, entity, primary_key, meta.column_metas(), self.codec())?;
        let values = BoundValues::new().columns(columns).ttl(ttl);

        match timestamp {
            Some(timestamp) => {
                let query = StatementGenerator::insert_with_timestamp(meta, timestamp, ttl);
                let bound = values.bind(&query)?;
                Ok(Statement::simple(query, bound, consistency))
            }
            None => {
                let prepared = Self::fixed(&self.insert_pss, &meta.type_id, "insert", meta)?;
                let bound = values.bind(&prepared.query)?;
                Ok(Statement::bound(prepared.clone(), bound, consistency))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_statement(
        &self,
        meta: &EntityMeta,
        entity: &(dyn Any + Send + Sync),
        primary_key: &Value,
        fields: &[Arc<PropertyMeta>],
        ttl: Option<i32>,
        timestamp: Option<i64>,
        consistency: ConsistencyLevel,
    ) -> Result<Statement> {
        let columns = binder::entity_columns(meta, entity, primary_key, fields, self.codec())?;
        let values = BoundValues::new().columns(columns).ttl(ttl);

        match timestamp {
            Some(timestamp) => {
                let query =
                    StatementGenerator::update_fields_with_timestamp(meta, fields, timestamp, ttl);
                let bound = values.bind(&query)?;
                Ok(Statement::simple(query, bound, consistency))
            }
            None => {
                let prepared = self
                    .cache
                    .get_cache_for_fields_update(self.session.as_ref(), meta, fields)
                    .await?;
                let bound = values.bind(&prepared.query)?;
                Ok(Statement::bound(prepared, bound, consistency))
            }
        }
    }

    pub fn removal_statement(
        &self,
        meta: &EntityMeta,
        primary_key: &Value,
        consistency: ConsistencyLevel,
    ) -> Result<Statement> {
        let prepared = Self::fixed(&self.remove_pss, &meta.table_name, "deletion", meta)?;
        let bound = BoundValues::new()
            .columns(binder::key_columns(meta, primary_key)?)
            .bind(&prepared.query)?;
        Ok(Statement::bound(prepared.clone(), bound, consistency))
    }

    fn simple_counter_values(
        &self,
        meta: &EntityMeta,
        property: &PropertyMeta,
        primary_key: &Value,
    ) -> Result<BoundValues> {
        let fqcn = property
            .counter_fqcn
            .clone()
            .unwrap_or_else(|| meta.type_name.clone());
        let serialized_key = self.codec.encode(&primary_key.to_json())?;
        Ok(BoundValues::new()
            .column(COUNTER_FQCN, Value::Text(fqcn))
            .column(COUNTER_PRIMARY_KEY, Value::Text(serialized_key))
            .column(COUNTER_PROPERTY_NAME, Value::Text(property.property_name.clone())))
    }

    /// Write on the shared counter table: increment, decrement or delete.
    pub fn simple_counter_statement(
        &self,
        operation: CounterOperation,
        meta: &EntityMeta,
        property: &PropertyMeta,
        primary_key: &Value,
        delta: i64,
        consistency: ConsistencyLevel,
    ) -> Result<Statement> {
        let prepared = Self::fixed(&self.counter_pss, &operation, "counter", meta)?;
        let bound = self
            .simple_counter_values(meta, property, primary_key)?
            .delta(delta)
            .bind(&prepared.query)?;
        Ok(Statement::bound(prepared.clone(), bound, consistency))
    }

    pub async fn get_simple_counter(
        &self,
        meta: &EntityMeta,
        property: &PropertyMeta,
        primary_key: &Value,
        consistency: ConsistencyLevel,
    ) -> Result<Option<i64>> {
        let prepared = Self::fixed(&self.counter_pss, &CounterOperation::Select, "counter", meta)?;
        let bound = self
            .simple_counter_values(meta, property, primary_key)?
            .bind(&prepared.query)?;
        let statement = Statement::bound(prepared.clone(), bound, consistency);
        let row = self.execute(&statement).await?.into_first();
        Ok(row.and_then(|row| row.get(COUNTER_VALUE).as_i64()))
    }

    fn clustered_counter_statements(
        &self,
        meta: &EntityMeta,
    ) -> Result<&ClusteredCounterStatements> {
        self.clustered_counter_pss.get(&meta.type_id).ok_or_else(|| {
            CqlMapError::BeanMapping(format!(
                "Cannot find prepared statement for clustered counter for table '{}'",
                meta.table_name
            ))
        })
    }

    /// Increment or decrement of one counter column of a clustered counter row.
    pub fn clustered_counter_statement(
        &self,
        operation: CounterOperation,
        meta: &EntityMeta,
        property: &PropertyMeta,
        primary_key: &Value,
        delta: i64,
        consistency: ConsistencyLevel,
    ) -> Result<Statement> {
        let statements = self.clustered_counter_statements(meta)?;
        let map = match operation {
            CounterOperation::Incr => &statements.incr,
            CounterOperation::Decr => &statements.decr,
            CounterOperation::Select | CounterOperation::Delete => {
                return Err(CqlMapError::Usage(format!(
                    "{:?} is not a clustered counter update",
                    operation
                )));
            }
        };
        let prepared = Self::fixed(map, &property.property_name, "clustered counter", meta)?;
        let bound = BoundValues::new()
            .columns(binder::key_columns(meta, primary_key)?)
            .delta(delta)
            .bind(&prepared.query)?;
        Ok(Statement::bound(prepared.clone(), bound, consistency))
    }

    pub async fn get_clustered_counter(
        &self,
        meta: &EntityMeta,
        property: &PropertyMeta,
        primary_key: &Value,
        consistency: ConsistencyLevel,
    ) -> Result<Option<i64>> {
        let statements = self.clustered_counter_statements(meta)?;
        let prepared = Self::fixed(
            &statements.select,
            &property.property_name,
            "clustered counter",
            meta,
        )?;
        let bound = BoundValues::new()
            .columns(binder::key_columns(meta, primary_key)?)
            .bind(&prepared.query)?;
        let statement = Statement::bound(prepared.clone(), bound, consistency);
        let row = self.execute(&statement).await?.into_first();
        Ok(row.and_then(|row| row.get(&property.property_name).as_i64()))
    }

    /// Eager columns of one record, or `None` when the row does not exist.
    pub async fn load_entity(
        &self,
        meta: &EntityMeta,
        primary_key: &Value,
        consistency: ConsistencyLevel,
    ) -> Result<Option<Row>> {
        let prepared = Self::fixed(&self.select_eager_pss, &meta.type_id, "select", meta)?;
        let bound = BoundValues::new()
            .columns(binder::key_columns(meta, primary_key)?)
            .bind(&prepared.query)?;
        let statement = Statement::bound(prepared.clone(), bound, consistency);
        Ok(self.execute(&statement).await?.into_first())
    }

    pub async fn load_property(
        &self,
        meta: &EntityMeta,
        property: &PropertyMeta,
        primary_key: &Value,
        consistency: ConsistencyLevel,
    ) -> Result<Option<Row>> {
        let prepared = self
            .cache
            .get_cache_for_field_select(self.session.as_ref(), meta, property)
            .await?;
        let bound = BoundValues::new()
            .columns(binder::key_columns(meta, primary_key)?)
            .bind(&prepared.query)?;
        let statement = Statement::bound(prepared, bound, consistency);
        Ok(self.execute(&statement).await?.into_first())
    }

    /// Runs an ad hoc range read.
    pub async fn slice(
        &self,
        query: Query,
        values: BoundValues,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>> {
        let bound = values.bind(&query)?;
        let statement = Statement::simple(query, bound, consistency);
        Ok(self.execute(&statement).await?.rows)
    }

    pub async fn execute(&self, statement: &Statement) -> Result<ResultSet> {
        trace!("Executing '{}' at {}", statement.cql(), statement.consistency);
        self.session.execute(statement).await
    }

    pub async fn execute_batch(&self, batch: &BatchStatement) -> Result<()> {
        trace!(
            "Executing batch of {} statements at {}",
            batch.statements.len(),
            batch.consistency
        );
        self.session.execute_batch(batch).await
    }
}
