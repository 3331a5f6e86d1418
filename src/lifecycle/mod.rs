//! Transaction lifecycle manager
//!
//! `Idle -> Submitting -> Polling -> {Confirmed, Rejected, TimedOut}`.
//! Submission is attempted once. Polling retries on "not finalized yet" and on
//! transient query faults until the deadline; a finalized failure or an
//! unusable query channel stops it immediately.

mod errors;
mod manager;
mod outcome;

pub use errors::{LifecycleError, LifecycleErrorKind};
pub use manager::{
    submit_and_confirm, LifecycleConfig, LifecycleState, TransactionLifecycleManager,
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};
pub use outcome::TransactionOutcome;
