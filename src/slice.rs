//! Range reads over the clustering components of one partition.

use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;

use crate::context::{FlushContext, Options, PersistenceContext};
use crate::core::{ConsistencyLevel, CqlMapError, Result, Value};
use crate::entity::{CqlValue, Entity};
use crate::metadata::EntityMeta;
use crate::operations::loader;
use crate::proxy::EntityProxy;
use crate::statement::SortDirection;

/// Order of the returned rows.
///
/// `Ascending` is the storage order of the table, so a clustering component
/// declared reversed comes back from the greatest value down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SliceOrdering {
    #[default]
    Ascending,
    Descending,
}

/// Builder of one slice query; `get` issues exactly one request.
pub struct SliceQueryBuilder<T: Entity> {
    meta: Arc<EntityMeta>,
    flush: FlushContext,
    partition_key: Vec<Value>,
    from_clustering: Vec<Value>,
    to_clustering: Vec<Value>,
    ordering: SliceOrdering,
    limit: Option<u32>,
    consistency: Option<ConsistencyLevel>,
    /// First conversion failure of a builder argument, reported by `get`.
    invalid: Option<CqlMapError>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SliceQueryBuilder<T> {
    pub(crate) fn new(meta: Arc<EntityMeta>, flush: FlushContext) -> Self {
        Self {
            meta,
            flush,
            partition_key: Vec::new(),
            from_clustering: Vec::new(),
            to_clustering: Vec::new(),
            ordering: SliceOrdering::default(),
            limit: None,
            consistency: None,
            invalid: None,
            _entity: PhantomData,
        }
    }

    /// Appends one partition component, in declaration order.
    pub fn partition_component<V: CqlValue>(mut self, value: V) -> Self {
        match value.to_value() {
            Ok(value) => self.partition_key.push(value),
            Err(err) => {
                self.invalid.get_or_insert(err);
            }
        }
        self
    }

    pub fn partition_key(mut self, components: impl IntoIterator<Item = Value>) -> Self {
        self.partition_key = components.into_iter().collect();
        self
    }

    /// Inclusive lower bound on a prefix of the clustering components.
    pub fn from_clustering(mut self, components: impl IntoIterator<Item = Value>) -> Self {
        self.from_clustering = components.into_iter().collect();
        self
    }

    /// Inclusive upper bound on a prefix of the clustering components.
    pub fn to_clustering(mut self, components: impl IntoIterator<Item = Value>) -> Self {
        self.to_clustering = components.into_iter().collect();
        self
    }

    pub fn ordering(mut self, ordering: SliceOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }

    fn direction(&self) -> Option<SortDirection> {
        match self.ordering {
            SliceOrdering::Ascending => None,
            SliceOrdering::Descending => {
                let first_reversed = self
                    .meta
                    .id_meta
                    .embedded_id
                    .as_ref()
                    .and_then(|e| e.clustering_components.first())
                    .is_some_and(|c| c.reversed);
                Some(if first_reversed {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                })
            }
        }
    }

    pub async fn get(self) -> Result<Vec<EntityProxy<T>>> {
        if let Some(err) = self.invalid {
            return Err(err);
        }
        let mut options = Options::new();
        if let Some(level) = self.consistency {
            options = options.consistency(level);
        }
        self.flush.check_options(&options)?;
        let direction = self.direction();
        let context = PersistenceContext::new(self.meta.clone(), Value::Null, self.flush, options);
        debug!(
            "Slice query on '{}': partition {:?}, from {:?} to {:?}, {:?}, limit {:?}",
            self.meta.table_name,
            self.partition_key,
            self.from_clustering,
            self.to_clustering,
            self.ordering,
            self.limit
        );

        let rows = context
            .slice(
                self.partition_key,
                self.from_clustering,
                self.to_clustering,
                direction,
                self.limit,
            )
            .await?;

        let mut proxies = Vec::with_capacity(rows.len());
        for row in rows {
            let primary_key = loader::primary_key_from_row(&self.meta, &row);
            let mut entity = T::default();
            self.meta.id_meta.set_value(&mut entity, primary_key.clone())?;
            loader::apply_eager_row(&self.meta, &mut entity, &row, context.codec())?;
            let mut proxy = EntityProxy::new(entity, context.duplicate(primary_key));
            proxy.mark_loaded(self.meta.eager_metas());
            proxies.push(proxy);
        }
        Ok(proxies)
    }

    pub async fn get_first(self) -> Result<Option<EntityProxy<T>>> {
        Ok(self.limit(1).get().await?.into_iter().next())
    }
}
