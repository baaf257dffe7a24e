//! Entry points: the factory bootstraps metadata and fixed statements once,
//! managers run the persistence operations against it.

use std::ops::Deref;
use std::sync::Arc;

use log::{debug, info};

use crate::config::ConfigurationContext;
use crate::context::{FlushContext, Options, PersistenceContext};
use crate::core::{ConsistencyLevel, ConsistencyLevelPolicy, CqlMapError, Result, Value};
use crate::entity::{CqlValue, Entity};
use crate::metadata::{EntityMeta, EntityMetaRegistry, EntityParser};
use crate::operations::{loader, merger, persister};
use crate::proxy::EntityProxy;
use crate::session::Session;
use crate::slice::SliceQueryBuilder;
use crate::statement::StatementDao;

/// Collects the record types to manage before bootstrap.
pub struct PersistenceManagerFactoryBuilder {
    config: ConfigurationContext,
    policy: ConsistencyLevelPolicy,
    registry: EntityMetaRegistry,
}

impl PersistenceManagerFactoryBuilder {
    pub fn new(config: ConfigurationContext) -> Self {
        let policy = config.new_consistency_policy();
        Self {
            config,
            policy,
            registry: EntityMetaRegistry::new(),
        }
    }

    /// Parses and registers the metadata of `T`.
    pub fn register<T: Entity>(mut self) -> Result<Self> {
        let meta = EntityParser::new(&self.config, &self.policy).parse::<T>()?;
        debug!("Registered entity '{}' on table '{}'", meta.type_name, meta.table_name);
        self.registry.insert(meta);
        Ok(self)
    }

    /// Prepares the fixed statements of every registered type on `session`.
    pub async fn build(self, session: Arc<dyn Session>) -> Result<PersistenceManagerFactory> {
        self.config.validate().map_err(CqlMapError::BeanMapping)?;
        let dao = StatementDao::bootstrap(session, &self.registry, &self.config).await?;
        info!("Bootstrapped {} entity types", self.registry.len());
        Ok(PersistenceManagerFactory {
            shared: Arc::new(Shared {
                config: self.config,
                policy: self.policy,
                registry: self.registry,
                dao: Arc::new(dao),
            }),
        })
    }
}

struct Shared {
    config: ConfigurationContext,
    policy: ConsistencyLevelPolicy,
    registry: EntityMetaRegistry,
    dao: Arc<StatementDao>,
}

/// Shared, read-only state built once per process.
#[derive(Clone)]
pub struct PersistenceManagerFactory {
    shared: Arc<Shared>,
}

impl PersistenceManagerFactory {
    pub fn builder(config: ConfigurationContext) -> PersistenceManagerFactoryBuilder {
        PersistenceManagerFactoryBuilder::new(config)
    }

    /// A manager whose writes run as soon as they are issued.
    pub fn create_persistence_manager(&self) -> PersistenceManager {
        PersistenceManager {
            shared: self.shared.clone(),
            flush: FlushContext::immediate(self.shared.dao.clone()),
        }
    }

    /// A manager that queues writes until `end_batch`.
    pub fn create_batching_persistence_manager(&self) -> BatchingPersistenceManager {
        BatchingPersistenceManager {
            inner: PersistenceManager {
                shared: self.shared.clone(),
                flush: FlushContext::batching(
                    self.shared.dao.clone(),
                    self.shared.config.force_batch_statements_ordering,
                ),
            },
        }
    }

    pub fn config(&self) -> &ConfigurationContext {
        &self.shared.config
    }

    pub fn consistency_policy(&self) -> &ConsistencyLevelPolicy {
        &self.shared.policy
    }

    pub fn registry(&self) -> &EntityMetaRegistry {
        &self.shared.registry
    }
}

pub struct PersistenceManager {
    shared: Arc<Shared>,
    flush: FlushContext,
}

impl PersistenceManager {
    pub fn meta<T: Entity>(&self) -> Result<Arc<EntityMeta>> {
        self.shared.registry.get::<T>()
    }

    pub fn consistency_policy(&self) -> &ConsistencyLevelPolicy {
        &self.shared.policy
    }

    fn context(
        &self,
        meta: Arc<EntityMeta>,
        primary_key: Value,
        options: Options,
    ) -> PersistenceContext {
        PersistenceContext::new(meta, primary_key, self.flush.clone(), options)
    }

    pub async fn persist<T: Entity>(&self, entity: T) -> Result<EntityProxy<T>> {
        self.persist_with_options(entity, Options::new()).await
    }

    /// Writes a new record and returns it managed.
    ///
    /// Every non-counter property of the result counts as loaded, so reads
    /// return the persisted values without a round trip.
    pub async fn persist_with_options<T: Entity>(
        &self,
        entity: T,
        options: Options,
    ) -> Result<EntityProxy<T>> {
        self.flush.check_options(&options)?;
        let meta = self.meta::<T>()?;
        let primary_key = persister::primary_key_of(&meta, &entity)?;
        let context = self.context(meta.clone(), primary_key, options);
        persister::persist(&context, &entity).await?;
        context.flush().await?;

        let mut proxy = EntityProxy::new(entity, context);
        proxy.mark_loaded(meta.column_metas());
        Ok(proxy)
    }

    pub async fn merge<T: Entity>(&self, proxy: &mut EntityProxy<T>) -> Result<()> {
        self.merge_with_options(proxy, Options::new()).await
    }

    /// Writes the dirty properties of a managed record.
    pub async fn merge_with_options<T: Entity>(
        &self,
        proxy: &mut EntityProxy<T>,
        options: Options,
    ) -> Result<()> {
        self.flush.check_options(&options)?;
        let context = self.context(proxy.meta().clone(), proxy.primary_key().clone(), options);
        merger::merge(&context, proxy).await?;
        context.flush().await
    }

    pub async fn remove<T: Entity>(&self, proxy: EntityProxy<T>) -> Result<()> {
        self.remove_with_options(proxy, Options::new()).await
    }

    pub async fn remove_with_options<T: Entity>(
        &self,
        proxy: EntityProxy<T>,
        options: Options,
    ) -> Result<()> {
        self.flush.check_options(&options)?;
        let context = self.context(proxy.meta().clone(), proxy.primary_key().clone(), options);
        persister::remove(&context).await?;
        context.flush().await
    }

    /// Deletes a record knowing only its primary key.
    pub async fn remove_by_id<T: Entity, K: CqlValue>(&self, primary_key: K) -> Result<()> {
        self.remove_by_id_with_options::<T, K>(primary_key, Options::new())
            .await
    }

    pub async fn remove_by_id_with_options<T: Entity, K: CqlValue>(
        &self,
        primary_key: K,
        options: Options,
    ) -> Result<()> {
        self.flush.check_options(&options)?;
        let meta = self.meta::<T>()?;
        let context = self.context(meta, primary_key.to_value()?, options);
        persister::remove(&context).await?;
        context.flush().await
    }

    pub async fn find<T: Entity, K: CqlValue>(
        &self,
        primary_key: K,
    ) -> Result<Option<EntityProxy<T>>> {
        self.find_with_options(primary_key, Options::new()).await
    }

    /// Loads the eager properties of a record; `None` when it does not exist.
    pub async fn find_with_options<T: Entity, K: CqlValue>(
        &self,
        primary_key: K,
        options: Options,
    ) -> Result<Option<EntityProxy<T>>> {
        self.flush.check_options(&options)?;
        let meta = self.meta::<T>()?;
        let context = self.context(meta.clone(), primary_key.to_value()?, options);
        let Some(entity) = loader::load::<T>(&context).await? else {
            debug!(
                "Entity '{}' with primary key {} not found",
                meta.type_name,
                context.primary_key()
            );
            return Ok(None);
        };
        let mut proxy = EntityProxy::new(entity, context);
        proxy.mark_loaded(meta.eager_metas());
        Ok(Some(proxy))
    }

    /// A managed record without any read: only the key is set, every other
    /// property loads on first access.
    pub fn get_reference<T: Entity, K: CqlValue>(&self, primary_key: K) -> Result<EntityProxy<T>> {
        self.get_reference_with_options(primary_key, Options::new())
    }

    pub fn get_reference_with_options<T: Entity, K: CqlValue>(
        &self,
        primary_key: K,
        options: Options,
    ) -> Result<EntityProxy<T>> {
        self.flush.check_options(&options)?;
        let meta = self.meta::<T>()?;
        let primary_key = primary_key.to_value()?;
        let mut entity = T::default();
        meta.id_meta.set_value(&mut entity, primary_key.clone())?;
        let context = self.context(meta, primary_key, options);
        Ok(EntityProxy::new(entity, context))
    }

    /// Reloads the eager properties and resets the dirty map and loaded set.
    /// Returns `false` when the row no longer exists.
    pub async fn refresh<T: Entity>(&self, proxy: &mut EntityProxy<T>) -> Result<bool> {
        let meta = proxy.meta().clone();
        debug!("Refreshing entity '{}' with primary key {}", meta.type_name, proxy.primary_key());
        let Some(row) = proxy.context().load_entity().await? else {
            return Ok(false);
        };
        let codec = self.shared.config.object_codec.clone();
        loader::apply_eager_row(&meta, proxy.target_mut(), &row, codec.as_ref())?;
        proxy.forget_loaded();
        proxy.mark_loaded(meta.eager_metas());
        proxy.clear_dirty();
        Ok(true)
    }

    /// Forces every lazy property of a managed record to load.
    pub async fn initialize<T: Entity>(&self, proxy: &mut EntityProxy<T>) -> Result<()> {
        proxy.initialize().await
    }

    pub fn slice_query<T: Entity>(&self) -> Result<SliceQueryBuilder<T>> {
        Ok(SliceQueryBuilder::new(self.meta::<T>()?, self.flush.clone()))
    }

    pub fn is_batch(&self) -> bool {
        self.flush.is_batch()
    }
}

/// Manager whose writes accumulate until `end_batch`.
///
/// Counter handles obtained from its records still apply immediately.
pub struct BatchingPersistenceManager {
    inner: PersistenceManager,
}

impl BatchingPersistenceManager {
    pub fn start_batch(&self) -> Result<()> {
        self.inner.flush.start_batch(None, None)
    }

    /// Opens a batch whose reads and writes all use the given levels.
    pub fn start_batch_with_consistency(
        &self,
        read_level: ConsistencyLevel,
        write_level: ConsistencyLevel,
    ) -> Result<()> {
        self.inner
            .flush
            .start_batch(Some(read_level), Some(write_level))
    }

    /// Sends the pending statements; without a batch level they run at the
    /// default write level.
    pub async fn end_batch(&self) -> Result<()> {
        self.inner
            .flush
            .end_batch(self.inner.shared.config.default_write_level)
            .await
    }

    /// Discards every pending statement and the batch levels.
    pub fn clean_batch(&self) -> Result<()> {
        self.inner.flush.clean_up()
    }

    pub fn pending_statements(&self) -> Result<usize> {
        self.inner.flush.pending()
    }
}

impl Deref for BatchingPersistenceManager {
    type Target = PersistenceManager;

    fn deref(&self) -> &PersistenceManager {
        &self.inner
    }
}
