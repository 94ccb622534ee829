//! Error types for buildflux

use thiserror::Error;

/// Result type alias for publication operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Main error type for a publication attempt
///
/// Only errors that must reach the caller end up here. Generator failures and
/// Targets with `expose_exceptions = false` are logged and swallowed by the
/// publication service.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A point could not be constructed
    #[error(transparent)]
    Point(#[from] PointError),

    /// A Target failed and is configured to expose its failures
    #[error("target '{target}' failed: {source}")]
    Target {
        target: String,
        #[source]
        source: ClientError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Error raised while constructing a point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointError {
    /// Measurement name was empty
    #[error("point has an empty measurement name")]
    EmptyMeasurement,

    /// A point needs at least one field to be written
    #[error("point '{measurement}' has no fields")]
    NoFields { measurement: String },

    /// The two line protocol renderings disagree on the measurement
    #[error("line protocol encodings disagree: legacy '{legacy}' vs current '{current}'")]
    EncodingMismatch { legacy: String, current: String },

    /// The line protocol writer refused the point
    #[error("line protocol encoding failed: {0}")]
    Encoding(String),
}

/// Error raised inside one generator
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The report was present but could not be turned into points
    #[error("malformed report: {0}")]
    Report(String),

    /// Point construction failed
    #[error(transparent)]
    Point(#[from] PointError),

    /// Upstream HTTP call failed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error type for database client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Target URL does not parse
    #[error("invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No authentication strategy produced a verified connection
    #[error("could not connect, attempted: {}", attempts.join("; "))]
    ConnectionFailed { attempts: Vec<String> },

    /// Write was called before a successful connect
    #[error("client is not connected")]
    NotInitialized,

    /// The backend rejected the write
    #[error("write rejected with {status}: {body}")]
    Write { status: u16, body: String },

    /// The batch could not be rendered
    #[error(transparent)]
    Encoding(#[from] PointError),

    /// Transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error type for configuration and the Target store
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment or option value could not be parsed
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Target failed validation
    #[error("invalid target '{description}': {reason}")]
    InvalidTarget { description: String, reason: String },

    /// Two Targets share a description
    #[error("duplicate target description '{0}'")]
    DuplicateTarget(String),

    /// No Target with that description
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// Store file could not be read or written
    #[error("target store IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Store file is not valid JSON
    #[error("target store at {path} is malformed: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Short outcome label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::InvalidUrl { .. } => "invalid_url",
            ClientError::ConnectionFailed { .. } => "connection_failed",
            ClientError::NotInitialized => "not_initialized",
            ClientError::Write { .. } => "write_failed",
            ClientError::Encoding(_) => "encoding",
            ClientError::Http(_) => "http",
        }
    }
}
