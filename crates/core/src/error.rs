//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid app name: {0}")]
    InvalidAppName(String),

    #[error("invalid dimension kind: {0}")]
    InvalidDimensionKind(String),

    #[error("invalid package extension: {0}")]
    InvalidPackageExtension(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
