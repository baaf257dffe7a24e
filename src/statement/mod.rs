pub mod binder;
pub mod cache;
pub mod dao;
pub mod generator;
pub mod query;

pub use binder::BoundValues;
pub use cache::{CacheManager, CacheType, StatementCacheKey};
pub use dao::StatementDao;
pub use generator::{COUNTER_TABLE, CounterOperation, StatementGenerator};
pub use query::{
    BatchStatement, BindSlot, Clause, ClusteringColumn, PreparedStatement, Query, QueryKind,
    SortDirection, Statement, StatementKind,
};
