//! Optical Scan Library
//!
//! Continuously captures frames from a live camera stream and decodes
//! machine-readable codes (barcodes, QR codes) from them, retrying on
//! transient failures and stopping cleanly on demand.
//!
//! # Architecture
//!
//! ```text
//! FrameSource → FrameCapture → DecodeAttempt
//!      ↑                            │
//!      └───────── ScanLoop ◀────────┘
//! ```
//!
//! The camera platform, the display surface and the symbol decoder are
//! external capabilities behind the [`MediaAcquisition`], [`DisplaySurface`]
//! and [`Decoder`] traits. This crate owns the control loop around them.
//!
//! # Design Principles
//!
//! - **One session at a time**: starting a scan tears down the previous one
//! - **One attempt in flight**: the next attempt is scheduled only after the
//!   current outcome is classified
//! - **Deterministic teardown**: `reset` cancels the timer and releases the
//!   stream together
//! - **Errors go to a sink**: no decode failure escapes the scan task
//!
//! # Example
//!
//! ```no_run
//! use optical_scan::{
//!     capture::MockAcquisition,
//!     decode::{DecodeError, Payload, ScriptedDecoder},
//!     scan::{ScanConfig, ScanLoop},
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), optical_scan::scan::ConfigError> {
//! let acquisition = Arc::new(MockAcquisition::new());
//! let decoder = Arc::new(ScriptedDecoder::new([
//!     Err(DecodeError::NotFound),
//!     Ok(Payload::new("ABC123")),
//! ]));
//!
//! let mut scanner = ScanLoop::with_config(acquisition, decoder, ScanConfig::with_interval_ms(500))?;
//! scanner
//!     .decode_from_input_video_device(|payload| println!("{}", payload.text), None, None)
//!     .await;
//!
//! // ... later
//! scanner.reset().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod decode;
pub mod metrics;
pub mod scan;

// Re-export commonly used types at crate root
pub use capture::{
    DeviceId, DisplaySurface, FrameCapture, FrameSource, MediaAcquisition, MockAcquisition,
    RasterBuffer,
};
pub use decode::{classify, DecodeError, Decoder, Outcome, Payload};
pub use metrics::ScanMetrics;
pub use scan::{ErrorSink, RetryPolicy, ScanConfig, ScanError, ScanLoop, ScanState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
