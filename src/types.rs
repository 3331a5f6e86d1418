//! Common types used throughout the crate

use crate::lifecycle::LifecycleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// `0x` followed by 1 to 64 hex digits
pub fn is_account_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(hex) => !hex.is_empty() && hex.len() <= 64 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Fully qualified entry function: `address::module::function`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryFunctionId {
    address: String,
    module: String,
    function: String,
}

impl EntryFunctionId {
    pub fn new(
        address: impl Into<String>,
        module: impl Into<String>,
        function: impl Into<String>,
    ) -> Result<Self, LifecycleError> {
        let id = Self {
            address: address.into(),
            module: module.into(),
            function: function.into(),
        };
        id.validate()?;
        Ok(id)
    }

    fn validate(&self) -> Result<(), LifecycleError> {
        if !is_account_address(&self.address) {
            return Err(LifecycleError::InvalidRequest(format!(
                "account address must be 0x-prefixed hex: {}",
                self.address
            )));
        }
        for (part, value) in [("module", &self.module), ("function", &self.function)] {
            if value.is_empty()
                || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(LifecycleError::InvalidRequest(format!(
                    "invalid {} identifier: {:?}",
                    part, value
                )));
            }
        }
        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl fmt::Display for EntryFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.function)
    }
}

impl FromStr for EntryFunctionId {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split("::");
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(m), Some(f), None) => Self::new(a, m, f),
            _ => Err(LifecycleError::InvalidRequest(format!(
                "expected address::module::function, got {:?}",
                s
            ))),
        }
    }
}

/// A request to invoke an entry function.
///
/// Fields are private: once built, the request cannot be changed, and
/// submission only ever borrows it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    function: EntryFunctionId,
    type_arguments: Vec<String>,
    arguments: Vec<Value>,
}

impl TransactionRequest {
    pub fn new(function: EntryFunctionId, type_arguments: Vec<String>, arguments: Vec<Value>) -> Self {
        Self {
            function,
            type_arguments,
            arguments,
        }
    }

    pub fn function(&self) -> &EntryFunctionId {
        &self.function
    }

    pub fn type_arguments(&self) -> &[String] {
        &self.type_arguments
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Wire shape handed to wallet extensions
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "type": "entry_function_payload",
            "function": self.function.to_string(),
            "type_arguments": self.type_arguments,
            "arguments": self.arguments,
        })
    }
}

/// Identifier returned by a signer for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: String,
}

/// Record type reported for a finalized user transaction
pub const USER_TRANSACTION: &str = "user_transaction";

/// Transaction record as reported by the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub hash: Option<String>,

    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub vm_status: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

/// Classification of a polled record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Finalized user transaction that executed successfully
    Succeeded,
    /// Finalized user transaction that aborted or failed
    Failed,
    /// Anything that is not yet a finalized user transaction
    Pending,
    /// Finalized type but without a success flag
    Malformed,
}

impl TransactionRecord {
    pub fn pending(hash: &str) -> Self {
        Self {
            kind: "pending_transaction".to_string(),
            hash: Some(hash.to_string()),
            success: None,
            vm_status: None,
            version: None,
        }
    }

    pub fn user_transaction(hash: &str, success: bool) -> Self {
        Self {
            kind: USER_TRANSACTION.to_string(),
            hash: Some(hash.to_string()),
            success: Some(success),
            vm_status: Some(if success {
                "Executed successfully".to_string()
            } else {
                "Move abort".to_string()
            }),
            version: None,
        }
    }

    pub fn state(&self) -> RecordState {
        if self.kind != USER_TRANSACTION {
            return RecordState::Pending;
        }
        match self.success {
            Some(true) => RecordState::Succeeded,
            Some(false) => RecordState::Failed,
            None => RecordState::Malformed,
        }
    }
}

/// Organization tier used when creating an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationType {
    Individual = 0,
    SmallOrg = 1,
    Enterprise = 2,
}

/// Parameters of `create_event`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventParams {
    pub creator: String,
    pub name: String,
    pub organization_type: OrganizationType,
    pub poap_enabled: bool,
    pub max_attendees: u64,
    /// Unix timestamp (seconds)
    pub event_date: u64,
}

/// Parameters of `mint_poap`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoapParams {
    pub participant: String,
    pub event_id: u64,
    pub event_creator: String,
}
