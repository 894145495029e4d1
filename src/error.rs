use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Upstream fetch errors.
///
/// `Clone` because one fetch outcome is fanned out to every caller coalesced
/// on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("could not fetch price for {symbol}")]
    NoPrice { symbol: String },

    #[error("no options found for {symbol}")]
    NoChain { symbol: String },

    #[error("expiration {requested} not listed for {symbol}")]
    UnknownExpiry { symbol: String, requested: String },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream fetch timed out after {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },
}

#[derive(Error, Debug)]
pub enum Error {
    /// Admission queue (or worker backlog) was at capacity; the request was
    /// shed, not queued. Distinct from any upstream failure.
    #[error("system overloaded: request queue is full, try again later")]
    Overloaded,

    /// Request failed validation before admission.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline shut down while a reply was still pending. Surfaced only
    /// if the dispatcher is dropped with requests in flight.
    #[error("pipeline closed before a reply was delivered")]
    PipelineClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidRequest {
            reason: reason.into(),
        }
    }
}
