//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Process-wide metrics registry
pub struct Metrics {
    registry: Registry,

    // Lifecycle counters
    pub tx_submitted: IntCounter,
    pub tx_confirmed: IntCounter,
    pub tx_rejected: IntCounter,
    pub tx_timed_out: IntCounter,
    pub tx_not_connected: IntCounter,
    pub tx_network_errors: IntCounter,
    pub poll_attempts: IntCounter,
    pub poll_transient_errors: IntCounter,

    // Persistence counters
    pub storage_calls: IntCounter,
    pub storage_remote_ok: IntCounter,
    pub storage_remote_failed: IntCounter,
    pub storage_encoded_ok: IntCounter,
    pub storage_encoded_failed: IntCounter,
    pub storage_local_ok: IntCounter,
    pub storage_local_failed: IntCounter,
    pub storage_total_failures: IntCounter,
    pub checksum_mismatches: IntCounter,

    // Histograms
    pub confirm_latency: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> anyhow::Result<IntCounter> {
    let c = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let confirm_latency = Histogram::with_opts(
            HistogramOpts::new(
                "tx_confirm_latency_seconds",
                "Time from submission to observed finality",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(confirm_latency.clone()))?;

        Ok(Self {
            tx_submitted: counter(&registry, "tx_submitted_total", "Transactions accepted by a signer")?,
            tx_confirmed: counter(&registry, "tx_confirmed_total", "Transactions confirmed successful")?,
            tx_rejected: counter(&registry, "tx_rejected_total", "Transactions that failed on-chain or at submission")?,
            tx_timed_out: counter(&registry, "tx_timed_out_total", "Confirmations abandoned at the deadline")?,
            tx_not_connected: counter(&registry, "tx_not_connected_total", "Submissions refused without a connected signer")?,
            tx_network_errors: counter(&registry, "tx_network_errors_total", "Confirmations stopped by an unusable query channel")?,
            poll_attempts: counter(&registry, "tx_poll_attempts_total", "Transaction status queries issued")?,
            poll_transient_errors: counter(&registry, "tx_poll_transient_errors_total", "Status queries that failed transiently")?,
            storage_calls: counter(&registry, "storage_calls_total", "store_secure invocations")?,
            storage_remote_ok: counter(&registry, "storage_remote_ok_total", "Remote store writes that landed")?,
            storage_remote_failed: counter(&registry, "storage_remote_failed_total", "Remote store writes that failed")?,
            storage_encoded_ok: counter(&registry, "storage_encoded_ok_total", "Encoded copies written")?,
            storage_encoded_failed: counter(&registry, "storage_encoded_failed_total", "Encoded copy writes that failed")?,
            storage_local_ok: counter(&registry, "storage_local_ok_total", "Local backups written")?,
            storage_local_failed: counter(&registry, "storage_local_failed_total", "Local backup writes that failed")?,
            storage_total_failures: counter(&registry, "storage_total_failures_total", "Calls where every target failed")?,
            checksum_mismatches: counter(&registry, "storage_checksum_mismatches_total", "Decoded envelopes whose checksum did not match")?,
            confirm_latency,
            registry,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let m = metrics();
        let before = m.tx_submitted.get();
        m.tx_submitted.inc();
        assert!(m.tx_submitted.get() >= before + 1);
    }

    #[test]
    fn test_render_contains_registered_names() {
        let m = metrics();
        m.poll_attempts.inc();
        let text = m.render().unwrap();
        assert!(text.contains("tx_poll_attempts_total"));
        assert!(text.contains("storage_calls_total"));
    }

    #[test]
    fn test_histogram_records() {
        let m = Metrics::new().unwrap();
        Timer::new().observe_duration(&m.confirm_latency);
        assert_eq!(m.confirm_latency.get_sample_count(), 1);
    }
}
