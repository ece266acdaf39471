//! Error types

use thiserror::Error;

/// A raw payload that could not be turned into an event
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Price is not finite: {0}")]
    NonFinitePrice(f64),

    #[error("Subject is empty")]
    EmptySubject,
}

/// The sink rejected an aggregate record
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Sink rejected record: {0}")]
    Rejected(String),

    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid batch size {0:?}: must be a positive integer")]
    InvalidBatchSize(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Source reader errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source disconnected: {0}")]
    Disconnected(String),

    #[error("Source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type WriteResult<T> = Result<T, WriteError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SourceResult<T> = Result<T, SourceError>;
