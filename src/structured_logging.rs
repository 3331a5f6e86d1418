//! Structured logging for lifecycle and persistence events

use crate::observability::TraceContext;

/// Structured logger bound to one operation's correlation id
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn for_context(ctx: &TraceContext) -> Self {
        Self::new(ctx.correlation_id().to_string())
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_submission(&self, function: &str, wallet: &str) {
        tracing::info!(
            context_id = %self.context_id,
            function = %function,
            wallet = %wallet,
            "Submitting transaction"
        );
    }

    pub fn log_submitted(&self, tx_id: &str) {
        tracing::info!(
            context_id = %self.context_id,
            tx_id = %tx_id,
            "Transaction accepted by signer, polling for finality"
        );
    }

    pub fn log_poll(&self, tx_id: &str, attempt: u32, state: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            tx_id = %tx_id,
            attempt = attempt,
            state = %state,
            "Polled transaction"
        );
    }

    pub fn log_transient_poll_error(&self, tx_id: &str, attempt: u32, error: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            tx_id = %tx_id,
            attempt = attempt,
            error = %error,
            "Transient poll error, retrying"
        );
    }

    pub fn log_confirmed(&self, tx_id: &str, polls: u32, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            tx_id = %tx_id,
            polls = polls,
            latency_ms = latency_ms,
            "Transaction confirmed"
        );
    }

    pub fn log_lifecycle_failure(&self, tx_id: Option<&str>, kind: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            tx_id = ?tx_id,
            kind = %kind,
            error = %error,
            "Transaction lifecycle failed"
        );
    }

    pub fn log_target(&self, target: &str, success: bool, detail: Option<&str>) {
        if success {
            tracing::debug!(
                context_id = %self.context_id,
                target = %target,
                detail = ?detail,
                "Storage target written"
            );
        } else {
            tracing::warn!(
                context_id = %self.context_id,
                target = %target,
                error = ?detail,
                "Storage target failed"
            );
        }
    }

    pub fn log_store_summary(&self, succeeded: bool, landed: &[&str]) {
        if succeeded {
            tracing::info!(
                context_id = %self.context_id,
                targets = ?landed,
                "Payload persisted across {} target(s)",
                landed.len()
            );
        } else {
            tracing::error!(
                context_id = %self.context_id,
                "All storage targets failed"
            );
        }
    }
}
