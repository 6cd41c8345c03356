//! Decode attempts and outcome classification.
//!
//! The symbol decoder itself is an external capability behind [`Decoder`].
//! This module runs one attempt against a captured frame and folds the
//! decoder's result into an [`Outcome`], the only thing the scan loop's
//! retry policy looks at.

mod outcome;
mod scripted;

pub use outcome::{attempt, classify, Outcome, OutcomeKind};
pub use scripted::{DecodeCall, ScriptedDecoder};

use crate::capture::RasterBuffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Content decoded from a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Decoded text.
    pub text: String,
    /// Raw symbol bytes, when the decoder exposes them.
    #[serde(default)]
    pub raw_bytes: Vec<u8>,
    /// Symbology name (e.g. `QR_CODE`, `EAN_13`).
    #[serde(default)]
    pub format: Option<String>,
    /// When the payload was decoded.
    pub timestamp: DateTime<Utc>,
}

impl Payload {
    /// Creates a text payload stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw_bytes: text.as_bytes().to_vec(),
            text,
            format: None,
            timestamp: Utc::now(),
        }
    }

    /// Sets the symbology name.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Failure categories a [`Decoder`] reports.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("no code found in frame")]
    NotFound,
    #[error("symbol checksum mismatch")]
    Checksum,
    #[error("malformed symbol: {0}")]
    Format(String),
    #[error("decoder failure: {0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl DecodeError {
    /// Wraps an arbitrary decoder error.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(error))
    }
}

/// Extracts a payload from a captured frame.
///
/// Implementations are called from the scan task, one frame at a time.
pub trait Decoder: Send + Sync {
    fn decode(&self, buffer: &RasterBuffer) -> Result<Payload, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&RasterBuffer) -> Result<Payload, DecodeError> + Send + Sync,
{
    fn decode(&self, buffer: &RasterBuffer) -> Result<Payload, DecodeError> {
        self(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let payload = Payload::new("ABC123").with_format("QR_CODE");
        assert_eq!(payload.text, "ABC123");
        assert_eq!(payload.raw_bytes, b"ABC123");
        assert_eq!(payload.format.as_deref(), Some("QR_CODE"));
    }

    #[test]
    fn test_closure_decoder() {
        let decoder = |buffer: &RasterBuffer| {
            if buffer.is_empty() {
                Err(DecodeError::NotFound)
            } else {
                Ok(Payload::new("hit"))
            }
        };

        assert!(matches!(
            decoder.decode(&RasterBuffer::new(0, 0)),
            Err(DecodeError::NotFound)
        ));
        assert_eq!(decoder.decode(&RasterBuffer::new(2, 2)).unwrap().text, "hit");
    }
}
