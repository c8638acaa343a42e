//! Error types for the resilience core.

use crate::config::ConfigurationError;
use crate::resilience::{ClassifiableError, FailureKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    #[error("Component not found: {0}")]
    ComponentNotFound(String),
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Restart failed for {component}: {reason}")]
    RestartFailed { component: String, reason: String },
    #[error("Invalid threshold for {resource}: warning {warning} must be below critical {critical}")]
    InvalidThreshold {
        resource: String,
        warning: f64,
        critical: f64,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigurationError> for ResilienceError {
    fn from(error: ConfigurationError) -> Self {
        ResilienceError::ConfigurationError(error.to_string())
    }
}

impl From<serde_json::Error> for ResilienceError {
    fn from(error: serde_json::Error) -> Self {
        ResilienceError::Internal(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, ResilienceError>;

/// Failures raised by an RPC client or trade executor
///
/// Callers with their own error types implement [`ClassifiableError`] instead;
/// this enum covers the common shapes for clients that do not.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("{0}")]
    Other(String),
}

impl ClassifiableError for RpcError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            RpcError::Connection(_) => FailureKind::Connection,
            RpcError::Timeout(_) => FailureKind::Timeout,
            RpcError::Sdk(_) => FailureKind::Sdk,
            RpcError::Transaction(_) => FailureKind::Transaction,
            RpcError::Other(_) => FailureKind::Other,
        }
    }
}
