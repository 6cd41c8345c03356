//! Prometheus metrics exporter for scan monitoring.
//!
//! # Metrics Exposed
//!
//! ## Session Metrics
//! - `optical_scan_sessions_started_total` - Scan sessions started
//! - `optical_scan_acquisition_failures_total` - Failed stream acquisitions
//! - `optical_scan_state` - Current state (0=idle, 1=acquiring, 2=waiting, 3=decoding)
//!
//! ## Decode Metrics
//! - `optical_scan_decode_attempts_total` - Decode attempts
//! - `optical_scan_outcomes_total{outcome}` - Attempts by classification
//! - `optical_scan_payloads_delivered_total` - Payloads passed to callbacks
//!
//! The HTTP exporter requires the `metrics` feature.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, ScanMetrics};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
