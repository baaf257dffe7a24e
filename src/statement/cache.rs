use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use log::trace;
use lru::LruCache;
use tokio::sync::OnceCell;

use crate::core::{CqlMapError, Result};
use crate::metadata::{EntityMeta, PropertyMeta};
use crate::session::Session;
use crate::statement::generator::StatementGenerator;
use crate::statement::query::{PreparedStatement, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    UpdateFields,
    SelectField,
}

/// Shape of a variable statement: operation, table and sorted field names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementCacheKey {
    pub cache_type: CacheType,
    pub table: String,
    pub fields: Vec<String>,
}

impl StatementCacheKey {
    pub fn new(
        cache_type: CacheType,
        table: &str,
        fields: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut fields: Vec<String> = fields.into_iter().collect();
        fields.sort();
        fields.dedup();
        Self {
            cache_type,
            table: table.to_string(),
            fields,
        }
    }
}

type Slot = Arc<OnceCell<Arc<PreparedStatement>>>;

/// Bounded cache of prepared statements for variable shapes.
///
/// Each key owns a once-cell: concurrent first uses of a shape wait on the
/// same preparation, so a shape is registered with the session only once.
pub struct CacheManager {
    cache: Mutex<LruCache<StatementCacheKey, Slot>>,
}

impl CacheManager {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            CqlMapError::BeanMapping("Prepared statement cache size must be > 0".to_string())
        })?;
        Ok(Self {
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn slot(&self, key: &StatementCacheKey) -> Result<Slot> {
        let mut cache = self.cache.lock()?;
        if let Some(slot) = cache.get(key) {
            trace!("Statement cache hit for {:?}", key);
            return Ok(slot.clone());
        }
        let slot: Slot = Arc::new(OnceCell::new());
        cache.put(key.clone(), slot.clone());
        Ok(slot)
    }

    async fn get_or_prepare(
        &self,
        session: &dyn Session,
        key: StatementCacheKey,
        query: impl FnOnce() -> Query,
    ) -> Result<Arc<PreparedStatement>> {
        let slot = self.slot(&key)?;
        let prepared = slot
            .get_or_try_init(|| async {
                trace!("Preparing statement for {:?}", key);
                session.prepare(&query()).await.map(Arc::new)
            })
            .await?;
        Ok(prepared.clone())
    }

    /// Prepared update of exactly `fields`.
    pub async fn get_cache_for_fields_update(
        &self,
        session: &dyn Session,
        meta: &EntityMeta,
        fields: &[Arc<PropertyMeta>],
    ) -> Result<Arc<PreparedStatement>> {
        let key = StatementCacheKey::new(
            CacheType::UpdateFields,
            &meta.table_name,
            fields.iter().map(|f| f.property_name.clone()),
        );
        self.get_or_prepare(session, key, || StatementGenerator::update_fields(meta, fields))
            .await
    }

    /// Prepared select of one lazily loaded property.
    pub async fn get_cache_for_field_select(
        &self,
        session: &dyn Session,
        meta: &EntityMeta,
        property: &PropertyMeta,
    ) -> Result<Arc<PreparedStatement>> {
        let key = StatementCacheKey::new(
            CacheType::SelectField,
            &meta.table_name,
            [property.property_name.clone()],
        );
        self.get_or_prepare(session, key, || StatementGenerator::select_field(meta, property))
            .await
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.cache.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_field_order() {
        let a = StatementCacheKey::new(
            CacheType::UpdateFields,
            "users",
            ["name".to_string(), "age".to_string()],
        );
        let b = StatementCacheKey::new(
            CacheType::UpdateFields,
            "users",
            ["age".to_string(), "name".to_string()],
        );
        assert_eq!(a, b);
        assert_ne!(
            a,
            StatementCacheKey::new(CacheType::SelectField, "users", ["name".to_string()])
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(CacheManager::new(0).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_prepares_once() {
        use crate::session::MemorySession;

        let session = Arc::new(MemorySession::new());
        let cache = Arc::new(CacheManager::new(16).unwrap());
        let query = Query::insert(
            "events",
            vec!["id".to_string()],
            Vec::new(),
            vec!["id".to_string()],
        );

        let mut handles = Vec::new();
        for _ in 0..32 {
            let session = session.clone();
            let cache = cache.clone();
            let query = query.clone();
            handles.push(tokio::spawn(async move {
                let key =
                    StatementCacheKey::new(CacheType::UpdateFields, "events", ["id".to_string()]);
                cache
                    .get_or_prepare(session.as_ref(), key, move || query)
                    .await
                    .unwrap()
            }));
        }

        let mut prepared = Vec::new();
        for handle in handles {
            prepared.push(handle.await.unwrap());
        }

        assert_eq!(session.prepared_count(), 1);
        assert!(prepared.iter().all(|p| Arc::ptr_eq(p, &prepared[0])));
        assert_eq!(cache.len().unwrap(), 1);
    }
}
