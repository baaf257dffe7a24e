use std::fmt;
use std::sync::Arc;

use crate::core::{ConsistencyLevel, ConsistencyLevelPolicy, Result};

/// Default capacity of the shape-keyed prepared statement cache.
pub const DEFAULT_PREPARED_STATEMENTS_CACHE_SIZE: usize = 5000;

/// Encodes complex field values to the text stored in the column, and back.
pub trait ObjectCodec: Send + Sync + fmt::Debug {
    fn encode(&self, value: &serde_json::Value) -> Result<String>;
    fn decode(&self, text: &str) -> Result<serde_json::Value>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn encode(&self, value: &serde_json::Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, text: &str) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Process-wide mapper configuration
///
/// Built once before bootstrap and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct ConfigurationContext {
    /// Read level for fields and types that declare no override
    pub default_read_level: ConsistencyLevel,

    /// Write level for fields and types that declare no override
    pub default_write_level: ConsistencyLevel,

    /// Upper bound of the field-subset statement cache
    pub prepared_statements_cache_size: usize,

    /// Give every batched write an increasing timestamp so the server applies them in push order
    pub force_batch_statements_ordering: bool,

    /// Codec for `Object` values
    pub object_codec: Arc<dyn ObjectCodec>,
}

impl ConfigurationContext {
    pub fn new() -> Self {
        Self {
            default_read_level: ConsistencyLevel::One,
            default_write_level: ConsistencyLevel::One,
            prepared_statements_cache_size: DEFAULT_PREPARED_STATEMENTS_CACHE_SIZE,
            force_batch_statements_ordering: true,
            object_codec: Arc::new(JsonCodec),
        }
    }

    /// Set the global default read consistency level
    pub fn default_read_level(mut self, level: ConsistencyLevel) -> Self {
        self.default_read_level = level;
        self
    }

    /// Set the global default write consistency level
    pub fn default_write_level(mut self, level: ConsistencyLevel) -> Self {
        self.default_write_level = level;
        self
    }

    /// Set the capacity of the field-subset statement cache
    pub fn prepared_statements_cache_size(mut self, size: usize) -> Self {
        self.prepared_statements_cache_size = size;
        self
    }

    pub fn force_batch_statements_ordering(mut self, enabled: bool) -> Self {
        self.force_batch_statements_ordering = enabled;
        self
    }

    /// Replace the codec used for complex values
    pub fn object_codec(mut self, codec: Arc<dyn ObjectCodec>) -> Self {
        self.object_codec = codec;
        self
    }

    /// Creates the per-table consistency registry seeded with the global defaults.
    pub fn new_consistency_policy(&self) -> ConsistencyLevelPolicy {
        ConsistencyLevelPolicy::new(self.default_read_level, self.default_write_level)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.prepared_statements_cache_size == 0 {
            return Err("prepared_statements_cache_size must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for ConfigurationContext {
    fn default() -> Self {
        Self::new()
    }
}
