use thiserror::Error;

#[derive(Error, Debug)]
pub enum CqlMapError {
    #[error("Bean mapping error: {0}")]
    BeanMapping(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Illegal access: {0}")]
    IllegalAccess(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl CqlMapError {
    /// Returns `true` for errors raised while building metadata or bootstrapping.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::BeanMapping(_))
    }
}

pub type Result<T> = std::result::Result<T, CqlMapError>;

impl<T> From<std::sync::PoisonError<T>> for CqlMapError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for CqlMapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
