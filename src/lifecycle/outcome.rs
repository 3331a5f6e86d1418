//! Result value of one lifecycle run

use super::errors::{LifecycleError, LifecycleErrorKind};
use serde::Serialize;
use serde_json::Value;

/// Outcome of `submit_and_confirm`.
///
/// Either `succeeded` with a transaction id, or not succeeded with an error
/// message. The constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome {
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<LifecycleErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_data: Option<Value>,
}

impl TransactionOutcome {
    pub fn confirmed(transaction_id: String, response_data: Option<Value>) -> Self {
        Self {
            succeeded: true,
            transaction_id: Some(transaction_id),
            error_message: None,
            error_kind: None,
            response_data,
        }
    }

    pub fn failed(error: &LifecycleError) -> Self {
        Self {
            succeeded: false,
            transaction_id: None,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            response_data: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_kind(&self) -> Option<LifecycleErrorKind> {
        self.error_kind
    }

    pub fn response_data(&self) -> Option<&Value> {
        self.response_data.as_ref()
    }
}

impl From<Result<(String, Option<Value>), LifecycleError>> for TransactionOutcome {
    fn from(result: Result<(String, Option<Value>), LifecycleError>) -> Self {
        match result {
            Ok((id, data)) => Self::confirmed(id, data),
            Err(e) => Self::failed(&e),
        }
    }
}
