use hdrhistogram::errors::{CreationError, RecordError};
use rustix::io::Errno;
use thiserror::Error;

/// Errors that can occur while ingesting, aggregating, or flushing metrics.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// A custom error with a free-form message.
    #[error("Custom error: {0}")]
    Custom(String),

    /// An I/O error from the standard library.
    #[error("Std Io error: {0}")]
    StdIo(#[from] std::io::Error),

    /// A low-level system errno.
    #[error("Errno error: {0}")]
    Errno(#[from] Errno),

    /// Failed to record a value into a histogram.
    #[error("Histogram record error: {0}")]
    Histogram(#[from] RecordError),

    /// Failed to create a histogram.
    #[error("Histogram creation error: {0}")]
    HistogramCreation(#[from] CreationError),

    /// A StatsD line could not be parsed.
    #[error("Unable to parse line: \"{0}\"")]
    MalformedLine(String),

    /// Name-resolution for a node's bind address failed.
    #[error("getaddrinfo(\"{host}\", \"{service}\") failed: {detail}")]
    AddressResolution {
        /// Host string passed to name resolution.
        host: String,
        /// Service (port) string passed to name resolution.
        service: String,
        /// Platform-provided failure detail.
        detail: String,
    },

    /// No socket could be bound for a node.
    #[error("unable to create listening socket for [{host}]:{service}")]
    NoListeningSocket {
        /// Host the node was configured with.
        host: String,
        /// Service (port) the node was configured with.
        service: String,
    },

    /// A node configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<String> for MetricsError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for MetricsError {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}
