//! Error types for the connector

use thiserror::Error;

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Failure descriptor returned by the remote system for a single call attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct Fault {
    /// Fault code as reported by the backend (e.g. `soap:Receiver`, `HTTP`)
    pub code: String,
    /// Human readable fault message
    pub message: String,
    /// Backend detail/trace, when present
    pub detail: Option<String>,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Errors that can occur while talking to the remote system or syncing entities
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Missing or duplicate initialization, invalid connector setup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or rejected credentials
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Remote call failed after the retry budget was exhausted
    #[error("remote call {operation} failed: {fault}")]
    Transport {
        operation: String,
        #[source]
        fault: Fault,
        last_request: Option<String>,
        last_response: Option<String>,
    },

    /// Empty or malformed response to an otherwise successful call
    #[error("sync error: {0}")]
    Sync(String),

    /// Action kind the gateway does not handle
    #[error("unsupported action type {0}")]
    UnsupportedAction(String),

    /// Entity store failure
    #[error("entity store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Returns the underlying fault for transport errors
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            ConnectorError::Transport { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ConnectorError::Transport { .. })
    }
}

impl From<config::ConfigError> for ConnectorError {
    fn from(err: config::ConfigError) -> Self {
        ConnectorError::Configuration(err.to_string())
    }
}
