//! Decoder replaying a fixed script of results.

use super::{DecodeError, Decoder, Payload};
use crate::capture::RasterBuffer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Record of one call into a [`ScriptedDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeCall {
    /// Runtime clock reading at the call (virtual under paused test time).
    pub at: Instant,
    /// Capture sequence of the decoded frame.
    pub sequence: u64,
    /// Red channel of the top-left pixel, if the frame is non-empty.
    pub tag: Option<u8>,
}

#[derive(Debug)]
struct Script {
    steps: VecDeque<Result<Payload, DecodeError>>,
    calls: Vec<DecodeCall>,
}

/// Returns scripted results in order, then a fallback forever.
///
/// Used by the demo binary and the scan loop tests. Every call is recorded,
/// and overlapping calls are detected.
#[derive(Debug)]
pub struct ScriptedDecoder {
    script: Mutex<Script>,
    fallback: Result<Payload, DecodeError>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDecoder {
    /// Replays `steps`, then reports [`DecodeError::NotFound`].
    pub fn new(steps: impl IntoIterator<Item = Result<Payload, DecodeError>>) -> Self {
        Self::with_fallback(steps, Err(DecodeError::NotFound))
    }

    pub fn with_fallback(
        steps: impl IntoIterator<Item = Result<Payload, DecodeError>>,
        fallback: Result<Payload, DecodeError>,
    ) -> Self {
        Self {
            script: Mutex::new(Script {
                steps: steps.into_iter().collect(),
                calls: Vec::new(),
            }),
            fallback,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Parses a comma separated script such as `miss,miss,ok:ABC123`.
    ///
    /// Steps: `miss` (not found), `checksum`, `format`, `fail:<msg>`
    /// (fatal) and `ok:<text>`.
    pub fn parse(script: &str) -> Result<Self, String> {
        let steps = script
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_step)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(steps))
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<DecodeCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Highest number of overlapping `decode` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Decoder for ScriptedDecoder {
    fn decode(&self, buffer: &RasterBuffer) -> Result<Payload, DecodeError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = {
            let mut script = self.lock();
            script.calls.push(DecodeCall {
                at: Instant::now(),
                sequence: buffer.sequence(),
                tag: buffer.pixel(0, 0).map(|px| px[0]),
            });
            script
                .steps
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result.map(|payload| Payload {
            timestamp: chrono::Utc::now(),
            ..payload
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ScriptedFailure(String);

fn parse_step(step: &str) -> Result<Result<Payload, DecodeError>, String> {
    let (name, arg) = match step.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (step, None),
    };
    match (name, arg) {
        ("miss", None) => Ok(Err(DecodeError::NotFound)),
        ("checksum", None) => Ok(Err(DecodeError::Checksum)),
        ("format", arg) => Ok(Err(DecodeError::Format(
            arg.unwrap_or("malformed symbol").to_owned(),
        ))),
        ("fail", arg) => Ok(Err(DecodeError::other(ScriptedFailure(
            arg.unwrap_or("scripted failure").to_owned(),
        )))),
        ("ok", Some(text)) => Ok(Ok(Payload::new(text).with_format("QR_CODE"))),
        _ => Err(format!("unknown script step: {step}")),
    }
}
