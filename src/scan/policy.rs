//! Retry policy as a pure decision table.

use crate::decode::OutcomeKind;
use serde::{Deserialize, Serialize};

/// Per-session retry and termination flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Reschedule when a frame holds no code.
    pub retry_on_not_found: bool,
    /// Reschedule when a code is corrupt or malformed.
    pub retry_on_checksum_or_format: bool,
    /// Stop after the first successful decode.
    pub single_shot: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_on_not_found: true,
            retry_on_checksum_or_format: true,
            single_shot: false,
        }
    }
}

/// What the loop does after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Schedule the next attempt after the configured delay.
    Reschedule,
    /// Stop advancing until a new session is started.
    Halt,
}

impl RetryPolicy {
    /// The default policy with `single_shot` set.
    pub fn single_shot() -> Self {
        Self {
            single_shot: true,
            ..Self::default()
        }
    }

    /// Decides the next step for an outcome.
    ///
    /// `stream_live` only matters after a success: a recoverable failure is
    /// rescheduled regardless, and the fired timer re-checks liveness.
    pub fn decide(&self, outcome: OutcomeKind, stream_live: bool) -> Decision {
        let reschedule = match outcome {
            OutcomeKind::Success => !self.single_shot && stream_live,
            OutcomeKind::NotFound => self.retry_on_not_found,
            OutcomeKind::ChecksumOrFormatError => self.retry_on_checksum_or_format,
            OutcomeKind::Fatal => false,
        };
        if reschedule {
            Decision::Reschedule
        } else {
            Decision::Halt
        }
    }
}
