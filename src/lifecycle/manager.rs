//! Submit → poll → classify

use super::errors::LifecycleError;
use super::outcome::TransactionOutcome;
use crate::metrics::{metrics, Timer};
use crate::observability::TraceContext;
use crate::rpc::TransactionQuery;
use crate::structured_logging::StructuredLogger;
use crate::types::{RecordState, TransactionRecord, TransactionRequest};
use crate::wallet::{WalletError, WalletSigner};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn, Instrument};

/// Recommended total confirmation budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Recommended delay between status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Timing parameters of one confirmation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl LifecycleConfig {
    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }
}

/// States of one lifecycle run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Submitting,
    Polling,
    Confirmed,
    Rejected,
    TimedOut,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected | Self::TimedOut)
    }

    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Idle, Rejected)
                | (Submitting, Polling)
                | (Submitting, Rejected)
                | (Polling, Confirmed)
                | (Polling, Rejected)
                | (Polling, TimedOut)
        )
    }
}

struct Run<'a> {
    state: LifecycleState,
    logger: &'a StructuredLogger,
}

impl<'a> Run<'a> {
    fn new(logger: &'a StructuredLogger) -> Self {
        Self {
            state: LifecycleState::Idle,
            logger,
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid lifecycle transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(
            context_id = %self.logger.context_id(),
            from = ?self.state,
            to = ?next,
            "Lifecycle transition"
        );
        self.state = next;
    }

    fn fail(&mut self, error: LifecycleError) -> LifecycleError {
        let next = match error {
            LifecycleError::Timeout { .. } => LifecycleState::TimedOut,
            _ => LifecycleState::Rejected,
        };
        self.transition(next);
        error
    }
}

/// Runs the submit/confirm flow with a fixed timing configuration.
///
/// The manager holds no per-run state; concurrent calls are independent.
#[derive(Debug, Clone, Default)]
pub struct TransactionLifecycleManager {
    config: LifecycleConfig,
}

impl TransactionLifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> LifecycleConfig {
        self.config
    }

    pub async fn submit_and_confirm<S, N>(
        &self,
        request: &TransactionRequest,
        signer: &S,
        network: &N,
    ) -> TransactionOutcome
    where
        S: WalletSigner + ?Sized,
        N: TransactionQuery + ?Sized,
    {
        submit_and_confirm(
            request,
            signer,
            network,
            self.config.timeout,
            self.config.poll_interval,
        )
        .await
    }

    /// Confirmation phase only, for a transaction submitted elsewhere
    pub async fn wait_for_confirmation<N>(
        &self,
        network: &N,
        tx_id: &str,
    ) -> Result<TransactionRecord, LifecycleError>
    where
        N: TransactionQuery + ?Sized,
    {
        let ctx = TraceContext::new("wait_for_confirmation");
        let logger = StructuredLogger::for_context(&ctx);
        poll_until_final(
            network,
            tx_id,
            self.config.timeout,
            self.config.poll_interval,
            &logger,
        )
        .instrument(ctx.span())
        .await
        .map(|(record, _)| record)
    }
}

/// Submit `request` through `signer`, then poll `network` until the
/// transaction is finalized or `timeout` elapses.
pub async fn submit_and_confirm<S, N>(
    request: &TransactionRequest,
    signer: &S,
    network: &N,
    timeout: Duration,
    poll_interval: Duration,
) -> TransactionOutcome
where
    S: WalletSigner + ?Sized,
    N: TransactionQuery + ?Sized,
{
    let ctx = TraceContext::new("submit_and_confirm");
    let logger = StructuredLogger::for_context(&ctx);

    let result = run(request, signer, network, timeout, poll_interval, &logger)
        .instrument(ctx.span())
        .await;

    if let Err(e) = &result {
        logger.log_lifecycle_failure(e.tx_id(), &e.kind().to_string(), &e.to_string());
    }
    TransactionOutcome::from(result)
}

async fn run<S, N>(
    request: &TransactionRequest,
    signer: &S,
    network: &N,
    timeout: Duration,
    poll_interval: Duration,
    logger: &StructuredLogger,
) -> Result<(String, Option<serde_json::Value>), LifecycleError>
where
    S: WalletSigner + ?Sized,
    N: TransactionQuery + ?Sized,
{
    let m = metrics();
    let mut tracker = Run::new(logger);

    if !signer.is_connected() {
        m.tx_not_connected.inc();
        return Err(tracker.fail(LifecycleError::NotConnected));
    }

    tracker.transition(LifecycleState::Submitting);
    logger.log_submission(&request.function().to_string(), signer.name());

    // Single attempt: submission is not idempotent
    let pending = match signer.sign_and_submit(request).await {
        Ok(pending) => pending,
        Err(WalletError::NotConnected) => {
            m.tx_not_connected.inc();
            return Err(tracker.fail(LifecycleError::NotConnected));
        }
        Err(e) => {
            m.tx_rejected.inc();
            return Err(tracker.fail(LifecycleError::TransactionFailed {
                tx_id: None,
                reason: e.to_string(),
            }));
        }
    };
    m.tx_submitted.inc();
    logger.log_submitted(&pending.hash);

    tracker.transition(LifecycleState::Polling);
    let timer = Timer::new();

    match poll_until_final(network, &pending.hash, timeout, poll_interval, logger).await {
        Ok((record, polls)) => {
            tracker.transition(LifecycleState::Confirmed);
            m.tx_confirmed.inc();
            timer.observe_duration(&m.confirm_latency);
            logger.log_confirmed(&pending.hash, polls, timer.elapsed_ms());
            Ok((pending.hash, serde_json::to_value(&record).ok()))
        }
        Err(e) => {
            match &e {
                LifecycleError::Timeout { .. } => m.tx_timed_out.inc(),
                LifecycleError::NetworkError(_) => m.tx_network_errors.inc(),
                _ => m.tx_rejected.inc(),
            }
            Err(tracker.fail(e))
        }
    }
}

async fn poll_until_final<N>(
    network: &N,
    tx_id: &str,
    timeout: Duration,
    poll_interval: Duration,
    logger: &StructuredLogger,
) -> Result<(TransactionRecord, u32), LifecycleError>
where
    N: TransactionQuery + ?Sized,
{
    let m = metrics();
    let start = Instant::now();
    let mut polls: u32 = 0;

    let timed_out = |polls: u32| LifecycleError::Timeout {
        tx_id: tx_id.to_string(),
        timeout_ms: timeout.as_millis() as u64,
        polls,
    };

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(timed_out(polls));
        }

        polls += 1;
        m.poll_attempts.inc();

        // A query still in flight at the deadline is abandoned
        let response = match tokio::time::timeout(remaining, network.get_transaction_by_id(tx_id)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(tx_id = %tx_id, polls, "Status query outlived the confirmation timeout");
                return Err(timed_out(polls));
            }
        };

        match response {
            Ok(Some(record)) => match record.state() {
                RecordState::Succeeded => return Ok((record, polls)),
                RecordState::Failed => {
                    return Err(LifecycleError::TransactionFailed {
                        tx_id: Some(tx_id.to_string()),
                        reason: record
                            .vm_status
                            .unwrap_or_else(|| "finalized unsuccessfully".to_string()),
                    });
                }
                RecordState::Pending => logger.log_poll(tx_id, polls, &record.kind),
                RecordState::Malformed => {
                    // Terminal type without a success flag: keep polling rather
                    // than report a failure that was never confirmed
                    warn!(tx_id = %tx_id, "Finalized record without success flag");
                    logger.log_poll(tx_id, polls, "malformed");
                }
            },
            Ok(None) => logger.log_poll(tx_id, polls, "not_found"),
            Err(e) if e.is_retryable() => {
                m.poll_transient_errors.inc();
                logger.log_transient_poll_error(tx_id, polls, &e.to_string());
            }
            Err(e) => return Err(LifecycleError::NetworkError(e.to_string())),
        }

        sleep(poll_interval.min(timeout.saturating_sub(start.elapsed()))).await;
    }
}
