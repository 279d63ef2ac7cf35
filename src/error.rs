//! Error types shared by every API group

use thiserror::Error;

/// A wire value that has no representation on the other side of a conversion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conversion error: {0}")]
pub struct ConversionError(pub String);

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Proxy errors
///
/// Every variant carries enough text to diagnose the failure on the client
/// side. None of them are retried by the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("disconnect failed: {0}")]
    Disconnect(String),

    #[error("disk operation failed: {0}")]
    Disk(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{action} failed: {reason}, output: {output:?}")]
    HostExecution {
        action: String,
        reason: String,
        output: String,
    },

    #[error("unknown method {group}/{version}/{method}")]
    UnknownMethod {
        group: String,
        version: String,
        method: String,
    },

    #[error("registration error: {0}")]
    Registration(String),
}

impl ProxyError {
    /// Short, stable name of the error class, reported to clients
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation",
            ProxyError::Conversion(_) => "conversion",
            ProxyError::Discovery(_) => "discovery",
            ProxyError::Connect(_) => "connect",
            ProxyError::Disconnect(_) => "disconnect",
            ProxyError::Disk(_) => "disk",
            ProxyError::NotFound(_) => "not_found",
            ProxyError::HostExecution { .. } => "host_execution",
            ProxyError::UnknownMethod { .. } => "unknown_method",
            ProxyError::Registration(_) => "registration",
        }
    }
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
