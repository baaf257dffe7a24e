use crate::core::ConsistencyLevel;

/// Per-call overrides for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub consistency: Option<ConsistencyLevel>,
    /// Time to live in seconds
    pub ttl: Option<i32>,
    /// Write timestamp in microseconds
    pub timestamp: Option<i64>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }

    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_consistency(level: ConsistencyLevel) -> Self {
        Self::new().consistency(level)
    }

    pub fn with_ttl(ttl: i32) -> Self {
        Self::new().ttl(ttl)
    }

    pub fn with_timestamp(timestamp: i64) -> Self {
        Self::new().timestamp(timestamp)
    }
}
