//! Metrics collection and registry.

use crate::decode::OutcomeKind;
use crate::scan::ScanState;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics for scan loops.
///
/// Cheap to clone; clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScanMetrics {
    registry: Registry,

    // Session metrics
    sessions_started: IntCounter,
    acquisition_failures: IntCounter,
    scan_state: IntGauge,

    // Decode metrics
    decode_attempts: IntCounter,
    outcomes: IntCounterVec,
    payloads_delivered: IntCounter,
}

impl ScanMetrics {
    /// Creates a new registry with all scan metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sessions_started = IntCounter::new(
            "optical_scan_sessions_started_total",
            "Total number of scan sessions started",
        )?;
        let acquisition_failures = IntCounter::new(
            "optical_scan_acquisition_failures_total",
            "Total number of failed camera stream acquisitions",
        )?;
        let scan_state = IntGauge::new(
            "optical_scan_state",
            "Current scan state (0=idle, 1=acquiring, 2=waiting, 3=decoding)",
        )?;

        let decode_attempts = IntCounter::new(
            "optical_scan_decode_attempts_total",
            "Total number of decode attempts",
        )?;
        let outcomes = IntCounterVec::new(
            Opts::new(
                "optical_scan_outcomes_total",
                "Decode attempt outcomes by classification",
            ),
            &["outcome"],
        )?;
        let payloads_delivered = IntCounter::new(
            "optical_scan_payloads_delivered_total",
            "Total number of payloads passed to scan callbacks",
        )?;

        registry.register(Box::new(sessions_started.clone()))?;
        registry.register(Box::new(acquisition_failures.clone()))?;
        registry.register(Box::new(scan_state.clone()))?;
        registry.register(Box::new(decode_attempts.clone()))?;
        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(payloads_delivered.clone()))?;

        Ok(Self {
            registry,
            sessions_started,
            acquisition_failures,
            scan_state,
            decode_attempts,
            outcomes,
            payloads_delivered,
        })
    }

    pub fn record_session_started(&self) {
        self.sessions_started.inc();
    }

    pub fn record_acquisition_failure(&self) {
        self.acquisition_failures.inc();
    }

    /// Records one classified decode attempt.
    pub fn record_outcome(&self, outcome: OutcomeKind) {
        self.decode_attempts.inc();
        self.outcomes.with_label_values(&[outcome.label()]).inc();
    }

    pub fn record_delivery(&self) {
        self.payloads_delivered.inc();
    }

    pub fn set_state(&self, state: ScanState) {
        self.scan_state.set(state.code());
    }

    /// Total decode attempts recorded.
    pub fn decode_attempts(&self) -> u64 {
        self.decode_attempts.get()
    }

    /// Attempts recorded with the given outcome.
    pub fn outcome_count(&self, outcome: OutcomeKind) -> u64 {
        self.outcomes.with_label_values(&[outcome.label()]).get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for ScanMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanMetrics")
            .field("sessions_started", &self.sessions_started.get())
            .field("decode_attempts", &self.decode_attempts.get())
            .field("scan_state", &self.scan_state.get())
            .finish()
    }
}
