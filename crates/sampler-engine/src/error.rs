//! Error types for the sampler engine

use thiserror::Error;

/// Errors that can occur while setting up or running the sampler
///
/// Connection and datagram failures at runtime are absorbed by the loop.
/// These errors are returned for startup problems and a failing poll instance.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No data sources configured
    #[error("no data sources configured")]
    NoSources,

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
