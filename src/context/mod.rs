pub mod flush;
pub mod options;
pub mod persistence;

pub use flush::{BatchingFlushContext, FlushContext};
pub use options::Options;
pub use persistence::PersistenceContext;
