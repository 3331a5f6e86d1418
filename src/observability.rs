//! Per-operation correlation for lifecycle runs and persistence calls

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identifier shared by every log line and span of one operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Context of a single `submit_and_confirm`, `wait_for_confirmation` or
/// `store_secure` invocation.
///
/// Each call builds its own context, so concurrent invocations never share
/// a correlation id.
#[derive(Debug, Clone, Serialize)]
pub struct TraceContext {
    operation: &'static str,
    correlation_id: CorrelationId,
    started_at_ms: i64,
}

impl TraceContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            correlation_id: CorrelationId::new(),
            started_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    /// `tracing` span tagged with the operation and correlation id
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "operation",
            op = self.operation,
            correlation_id = %self.correlation_id,
        )
    }
}
