//! Error types for the Sync Health Monitor

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing the sync pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Database unreachable or handshake failed
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// Query failed on one side (malformed/missing table, type mismatch)
    #[error("database query error: {0}")]
    Query(#[source] sqlx::Error),

    /// Database call exceeded its timeout budget
    #[error("database call timed out after {0:?}")]
    QueryTimeout(std::time::Duration),

    /// Kafka Connect REST transport failure
    #[error("control plane request error: {0}")]
    ApiTransport(#[source] reqwest::Error),

    /// Kafka Connect returned a non-success status
    #[error("control plane returned status: {0}")]
    ApiStatus(reqwest::StatusCode),

    /// Kafka Connect response could not be decoded
    #[error("failed to parse control plane response: {0}")]
    ApiParse(String),

    /// Broker subscription or consume failure
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Metric registration or encoding error
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
