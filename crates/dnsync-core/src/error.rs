//! Error types for the reconciliation core
//!
//! Per-record failures (`Transport`, `ProviderResponse`) are reported by the
//! apply stage and never abort a pass. A `Fetch` failure aborts the pass
//! before anything is applied.

use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A record name does not end with any configured domain
    #[error("Unconfigured domain for record name: {0}")]
    UnconfiguredDomain(String),

    /// Listing the remote records of a domain failed
    #[error("Failed to fetch remote records for {domain}: {source}")]
    Fetch {
        /// Domain whose zone was being listed
        domain: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// The provider could not be reached (connect error, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status
    #[error("Provider responded {status}: {body}")]
    ProviderResponse {
        /// HTTP status code
        status: u16,
        /// Response body, as returned by the provider
        body: String,
        /// Serialized request body, if the call had one
        request: Option<String>,
    },

    /// Malformed or unexpected provider payload
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Record store errors
    #[error("Record store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an unconfigured-domain error
    pub fn unconfigured(name: impl Into<String>) -> Self {
        Self::UnconfiguredDomain(name.into())
    }

    /// Wrap a listing failure for `domain`
    pub fn fetch(domain: impl Into<String>, source: Error) -> Self {
        Self::Fetch {
            domain: domain.into(),
            source: Box::new(source),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a provider response error
    pub fn provider_response(status: u16, body: impl Into<String>, request: Option<String>) -> Self {
        Self::ProviderResponse {
            status,
            body: body.into(),
            request,
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a record store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether a retry of the same call could plausibly succeed
    ///
    /// Transport failures, rate limiting and provider-side 5xx are
    /// transient; every other failure will repeat itself.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::ProviderResponse { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::transport("connection refused").is_transient());
        assert!(Error::provider_response(429, "slow down", None).is_transient());
        assert!(Error::provider_response(503, "unavailable", None).is_transient());
        assert!(!Error::provider_response(400, "bad record", None).is_transient());
        assert!(!Error::unconfigured("a.example.org").is_transient());
    }

    #[test]
    fn test_fetch_error_keeps_source() {
        let err = Error::fetch("example.com", Error::transport("timed out"));
        let msg = err.to_string();
        assert!(msg.contains("example.com"));
        assert!(msg.contains("timed out"));
    }
}
