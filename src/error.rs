use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed or out-of-range input. No state is touched.
    #[error("validation error: {0}")]
    Validation(String),
    /// Unauthenticated caller, or a non-admin on an admin intent. Raised by
    /// the routing collaborator before the core runs; defined here so the
    /// boundary shares one error type.
    #[error("auth error: {0}")]
    Auth(String),
    /// A domain rule rejected the intent. No partial mutation occurs.
    #[error("{0}")]
    BusinessRule(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
