//! Telemetry error types.

/// Errors raised by the metric backend, the instrumentor and the runtime.
///
/// Errors from a wrapped operation are never converted into this type; the
/// caller always sees the operation's own error.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Metrics runtime already started")]
    AlreadyStarted,

    #[error("Instrumentor already set up")]
    AlreadySetUp,

    #[error("Invalid instrument name: {0:?}")]
    InvalidInstrumentName(String),

    #[error("Metric backend error: {0}")]
    Backend(String),

    #[error("Metrics exporter error: {0}")]
    Exporter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
