//! Error types for the streak engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the streak engine
#[derive(Error, Debug)]
pub enum Error {
    /// A referenced partnership or habit does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A backing store could not be reached or failed the request
    #[error("{store} unavailable: {reason}")]
    StoreUnavailable { store: &'static str, reason: String },

    /// A completion record had no usable date.
    ///
    /// Never returned from derivation; bad records are skipped there.
    #[error("Malformed completion record: {0}")]
    MalformedRecord(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a missing partnership.
    pub fn partnership_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: "partnership",
            id: id.to_string(),
        }
    }

    /// Shorthand for a store failure.
    pub fn store_unavailable(store: &'static str, reason: impl Into<String>) -> Self {
        Error::StoreUnavailable {
            store,
            reason: reason.into(),
        }
    }

    /// True when the caller should map this to a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for transient store failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. })
    }
}
