//! mintmark - transaction lifecycle and multi-target persistence
//!
//! This library exposes the lifecycle manager, the persistence helper and
//! the adapters they run against.

pub mod config;
pub mod contract;
pub mod lifecycle;
pub mod metrics;
pub mod observability;
pub mod rpc;
pub mod storage;
pub mod structured_logging;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use lifecycle::{
    submit_and_confirm, LifecycleError, LifecycleErrorKind, TransactionLifecycleManager, TransactionOutcome,
};
pub use storage::{Payload, PersistenceHelper, PersistenceKeys, PersistenceResult, TargetStatus};
pub use types::{EntryFunctionId, TransactionRecord, TransactionRequest};
pub use wallet::{WalletManager, WalletSigner};
