//! Scan errors and where they go.

use crate::capture::{PlatformError, SourceError};
use crate::decode::DecodeError;
use thiserror::Error;

/// Errors surfaced by the scan loop.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("scan session ended without a result")]
    SessionEnded,
    #[error("failed to enumerate devices: {0}")]
    Enumerate(PlatformError),
}

/// Receives errors that stop a scan session.
///
/// Errors are reported from the session task and never propagate across the
/// scheduling boundary, so this is the only place a caller sees them.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: ScanError);
}

/// Logs errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: ScanError) {
        tracing::error!(error = %error, "Scan session stopped");
    }
}

impl<F> ErrorSink for F
where
    F: Fn(ScanError) + Send + Sync,
{
    fn report(&self, error: ScanError) {
        self(error)
    }
}
