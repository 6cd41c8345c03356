//! One decode cycle and its classification.

use super::{DecodeError, Decoder, Payload};
use crate::capture::RasterBuffer;

/// Classified result of one decode attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A symbol was decoded.
    Success(Payload),
    /// The frame holds no recognizable symbol.
    NotFound,
    /// A symbol was found but is corrupt or malformed.
    ChecksumOrFormatError(DecodeError),
    /// Any other decoder failure. Carries the original error.
    Fatal(DecodeError),
}

/// Tag of an [`Outcome`] without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    NotFound,
    ChecksumOrFormatError,
    Fatal,
}

impl OutcomeKind {
    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::ChecksumOrFormatError => "checksum_or_format",
            Self::Fatal => "fatal",
        }
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::NotFound => OutcomeKind::NotFound,
            Self::ChecksumOrFormatError(_) => OutcomeKind::ChecksumOrFormatError,
            Self::Fatal(_) => OutcomeKind::Fatal,
        }
    }

    /// The failure behind a non-success outcome.
    pub fn into_error(self) -> Option<DecodeError> {
        match self {
            Self::Success(_) => None,
            Self::NotFound => Some(DecodeError::NotFound),
            Self::ChecksumOrFormatError(e) | Self::Fatal(e) => Some(e),
        }
    }
}

/// Maps a decoder result onto exactly one [`Outcome`].
pub fn classify(result: Result<Payload, DecodeError>) -> Outcome {
    match result {
        Ok(payload) => Outcome::Success(payload),
        Err(DecodeError::NotFound) => Outcome::NotFound,
        Err(e @ (DecodeError::Checksum | DecodeError::Format(_))) => {
            Outcome::ChecksumOrFormatError(e)
        }
        Err(e @ DecodeError::Other(_)) => Outcome::Fatal(e),
    }
}

/// Runs `decoder` on `buffer` and classifies the result.
pub fn attempt(decoder: &dyn Decoder, buffer: &RasterBuffer) -> Outcome {
    let outcome = classify(decoder.decode(buffer));
    tracing::trace!(
        sequence = buffer.sequence(),
        outcome = outcome.kind().label(),
        "Decode attempt finished"
    );
    outcome
}
