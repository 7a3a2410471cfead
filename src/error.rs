//! Error types for grid-intensity
//!
//! All modules use `GridResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for grid-intensity operations
pub type GridResult<T> = Result<T, GridError>;

/// All errors that can occur in grid-intensity
#[derive(Error, Debug)]
pub enum GridError {
    // Input errors
    #[error("no region provided")]
    NoRegionProvided,

    #[error("region {region} is not supported by provider {provider}")]
    InvalidRegion { provider: String, region: String },

    #[error("region {0:?} not found")]
    RegionNotFound(String),

    #[error("provider {0:?} not recognized")]
    UnknownProvider(String),

    // Deadline errors
    #[error("timed out")]
    Timeout,

    // Upstream errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("received non-200 status: {status}")]
    BadStatus { status: u16 },

    #[error("received 403 forbidden")]
    Forbidden,

    #[error("no data was received in response, try again later")]
    NoResponse,

    #[error("could not decode {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("provider task failed: {0}")]
    Task(String),

    // Cache errors
    #[error("timed out acquiring lock on {path}")]
    LockTimeout { path: PathBuf },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} env var must be set")]
    MissingEnv(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl GridError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a decode error for an upstream payload
    pub fn decode(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors raised by the cache layer. Callers fall through to an upstream
    /// fetch when they see one of these.
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::Io { .. } | Self::Json(_)
        )
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Http(_) | Self::NoResponse | Self::LockTimeout { .. } => true,
            Self::BadStatus { status } => *status >= 500,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoRegionProvided => Some("Pass --region or run: grid-intensity config set general.regions <code>"),
            Self::UnknownProvider(_) => Some("Run: grid-intensity provider list"),
            Self::Forbidden => Some("Check the provider credentials in your environment"),
            Self::LockTimeout { .. } => Some("Another process holds the cache lock; retry or run: grid-intensity cache clear"),
            _ => None,
        }
    }
}
