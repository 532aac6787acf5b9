//! Error types for the discovery system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the discovery system
#[derive(Error, Debug)]
pub enum Error {
    /// A request did not complete within its per-call timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Socket or transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote agent or responder answered with an error status
    #[error("Protocol error {code} ({context})")]
    Protocol {
        /// Protocol-specific error code (SNMP error-status, DNS rcode)
        code: i32,
        /// The OID or query that triggered the error
        context: String,
    },

    /// The agent answered none of the requests of a discovery pass
    #[error("No response from agent {0}")]
    NoResponse(String),

    /// The responder answered, but with nothing usable
    #[error("Empty answer: {0}")]
    EmptyAnswer(String),

    /// The registry already holds a conflicting entry
    #[error("Registry conflict: {0}")]
    RegistryConflict(String),

    /// Registry API errors
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed object identifier
    #[error("Invalid OID: {0}")]
    InvalidOid(String),

    /// Unknown MIB module or symbol
    #[error("Unknown MIB symbol: {0}")]
    UnknownSymbol(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from registry APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(code: i32, context: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            context: context.into(),
        }
    }

    /// Create a registry conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::RegistryConflict(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid OID error
    pub fn invalid_oid(msg: impl Into<String>) -> Self {
        Self::InvalidOid(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error comes from the registry side of a run
    pub fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_) | Self::RegistryConflict(_) | Self::Http(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
