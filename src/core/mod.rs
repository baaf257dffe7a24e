pub mod consistency;
pub mod error;
pub mod value;

pub use consistency::{ConsistencyLevel, ConsistencyLevelPolicy};
pub use error::{CqlMapError, Result};
pub use value::{Value, ValueType};
