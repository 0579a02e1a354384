use crate::config::ConfigError;
use crate::store::StoreError;
use thiserror::Error;

/// Error types for lookups, seeding and the admin service
#[derive(Debug, Error)]
pub enum L10nError {
    /// Store backend failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Invalid or incomplete configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Import document could not be read at all
    #[error("Import error: {0}")]
    Import(String),
    /// Export could not be rendered
    #[error("Export error: {0}")]
    Export(String),
    /// Request rejected before reaching the store
    #[error("Invalid request: {0}")]
    Invalid(String),
    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// Row already exists for the same key, culture and tenant
    #[error("Duplicate: {0}")]
    Duplicate(String),
    /// System key deletion attempted without force
    #[error("Protected: {0}")]
    Protected(String),
}

/// Result type for library operations
pub type L10nResult<T> = Result<T, L10nError>;
