// ============================================================================
// cqlmap Library
// ============================================================================

//! Entity mapper for wide-column stores.
//!
//! Record types are described with `#[derive(Entity)]`, parsed once at
//! bootstrap into [`metadata::EntityMeta`], and managed through
//! [`PersistenceManager`] or [`BatchingPersistenceManager`]. Managed records
//! are [`EntityProxy`] values: unloaded properties are fetched on first read,
//! writes are tracked and sent by `merge` as one update.
//!
//! ```ignore
//! use cqlmap::{ConfigurationContext, Counter, Entity, MemorySession, PersistenceManagerFactory};
//!
//! #[derive(Debug, Default, Entity)]
//! struct User {
//!     #[id]
//!     id: i64,
//!     #[column]
//!     name: String,
//!     #[column(lazy)]
//!     friends: Vec<String>,
//!     #[column]
//!     visits: Counter,
//! }
//!
//! let factory = PersistenceManagerFactory::builder(ConfigurationContext::new())
//!     .register::<User>()?
//!     .build(Arc::new(MemorySession::new()))
//!     .await?;
//! let manager = factory.create_persistence_manager();
//!
//! let mut user = manager.persist(User { id: 1, name: "ann".into(), ..Default::default() }).await?;
//! user.list_mut::<String>("friends").await?.push("bob".into())?;
//! manager.merge(&mut user).await?;
//! user.counter("visits")?.incr().await?;
//! ```

extern crate self as cqlmap;

pub mod config;
pub mod context;
pub mod core;
pub mod entity;
pub mod manager;
pub mod metadata;
pub mod operations;
pub mod proxy;
pub mod session;
pub mod slice;
pub mod statement;

// Re-export main types for convenience
pub use config::{ConfigurationContext, JsonCodec, ObjectCodec};
pub use context::Options;
pub use core::{ConsistencyLevel, ConsistencyLevelPolicy, CqlMapError, Result, Value, ValueType};
pub use entity::{CompoundKey, Counter, CqlValue, Entity, Json, ValueKind};
pub use manager::{
    BatchingPersistenceManager, PersistenceManager, PersistenceManagerFactory,
    PersistenceManagerFactoryBuilder,
};
pub use proxy::{CounterHandle, EntityProxy, ListWrapper, MapWrapper, SetWrapper};
pub use session::{MemorySession, ResultSet, Row, Session};
pub use slice::{SliceOrdering, SliceQueryBuilder};

// Derive macros live in the macro namespace, next to the traits of the same name.
pub use cqlmap_derive::{CompoundKey, Entity};
