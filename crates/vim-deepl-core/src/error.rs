//! Application error taxonomy
//!
//! Repositories raise `StorageError`; services translate failures into either
//! a structured payload (provider errors on translation endpoints) or an
//! `AppError`. The HTTP façade owns the single mapping to status codes.

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Service-level error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or ill-typed inputs (HTTP 400, code `ARGS`)
    #[error("{0}")]
    Args(String),
    /// Lookup target absent (HTTP 404)
    #[error("{0}")]
    NotFound(String),
    /// Upstream API failed or returned an unusable response
    #[error("{0}")]
    Provider(String),
    /// Database unavailable or constraint violation (HTTP 500)
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Filesystem error outside the database (HTTP 500)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Environment misconfiguration at startup
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Service result type
pub type Result<T> = std::result::Result<T, AppError>;
