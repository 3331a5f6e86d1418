//! Error taxonomy for the transaction lifecycle

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle failures.
///
/// Only `TransactionFailed` reflects a confirmed negative result. `Timeout`
/// means the fate of the transaction is unknown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No signer is currently authorized
    #[error("Wallet not connected")]
    NotConnected,

    /// Submission was refused, or the network finalized the transaction as failed
    #[error("Transaction failed: {reason}")]
    TransactionFailed {
        tx_id: Option<String>,
        reason: String,
    },

    /// No terminal state was observed before the deadline
    #[error("Transaction timeout after {timeout_ms}ms ({polls} polls, tx: {tx_id})")]
    Timeout {
        tx_id: String,
        timeout_ms: u64,
        polls: u32,
    },

    /// The query channel itself is unusable
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request could not be built
    #[error("Invalid transaction request: {0}")]
    InvalidRequest(String),
}

/// Copyable discriminant of [`LifecycleError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleErrorKind {
    NotConnected,
    TransactionFailed,
    Timeout,
    NetworkError,
    InvalidRequest,
}

impl LifecycleError {
    pub fn kind(&self) -> LifecycleErrorKind {
        match self {
            Self::NotConnected => LifecycleErrorKind::NotConnected,
            Self::TransactionFailed { .. } => LifecycleErrorKind::TransactionFailed,
            Self::Timeout { .. } => LifecycleErrorKind::Timeout,
            Self::NetworkError(_) => LifecycleErrorKind::NetworkError,
            Self::InvalidRequest(_) => LifecycleErrorKind::InvalidRequest,
        }
    }

    /// Transaction id known at the time of failure, if any
    pub fn tx_id(&self) -> Option<&str> {
        match self {
            Self::TransactionFailed { tx_id, .. } => tx_id.as_deref(),
            Self::Timeout { tx_id, .. } => Some(tx_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotConnected => "not_connected",
            Self::TransactionFailed => "transaction_failed",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::InvalidRequest => "invalid_request",
        };
        f.write_str(s)
    }
}
