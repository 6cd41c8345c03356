//! One scanning run, from acquisition to teardown.
//!
//! A [`ScanSession`] is moved into a single spawned task and drives the
//! state machine sequentially: acquire, wait for `Playing`, then alternate
//! between a pending timer and one decode attempt. Because the task owns the
//! stream, the capture buffer and the only timer, at most one attempt is in
//! flight and at most one timer is pending by construction.

use super::{Decision, ErrorSink, RetryPolicy, ScanError, ScanState};
use crate::capture::{DeviceId, FrameCapture, FrameSource};
use crate::decode::{attempt, Decoder, Outcome, Payload};
use crate::metrics::ScanMetrics;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

/// Callback receiving each decoded payload.
pub(crate) type ScanCallback = Box<dyn FnMut(Payload) + Send>;

/// Collaborators and settings shared by every session of a loop.
pub(crate) struct SessionContext {
    pub decoder: Arc<dyn Decoder>,
    pub sink: Arc<dyn ErrorSink>,
    pub metrics: Option<ScanMetrics>,
    pub state: Arc<watch::Sender<ScanState>>,
    pub delay: Duration,
    pub policy: RetryPolicy,
}

pub(crate) struct ScanSession {
    id: u64,
    source: FrameSource,
    capture: FrameCapture,
    timer: Option<Pin<Box<Sleep>>>,
    callback: ScanCallback,
    ctx: SessionContext,
    cancel: CancellationToken,
}

impl ScanSession {
    pub fn new(
        id: u64,
        source: FrameSource,
        callback: ScanCallback,
        ctx: SessionContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            source,
            capture: FrameCapture::new(),
            timer: None,
            callback,
            ctx,
            cancel,
        }
    }

    /// Runs the session until it halts or is cancelled, then releases
    /// everything it holds.
    pub async fn run(mut self, device: Option<DeviceId>) {
        self.set_state(ScanState::Acquiring);

        let started = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.source.start(device.as_ref()) => Some(result),
        };

        match started {
            None => {
                tracing::debug!(session = self.id, "Cancelled during acquisition");
                self.release_all();
                return;
            }
            Some(Err(e)) => {
                if let Some(metrics) = &self.ctx.metrics {
                    metrics.record_acquisition_failure();
                }
                self.release_all();
                self.ctx.sink.report(ScanError::Source(e));
                return;
            }
            Some(Ok(ready)) => {
                tracing::info!(
                    session = self.id,
                    stream = %ready.stream_id,
                    width = ready.width,
                    height = ready.height,
                    "Scanning started"
                );
            }
        }

        self.schedule();
        while let Some(timer) = self.timer.as_mut() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.source.ended() => {
                    tracing::info!(session = self.id, "Stream ended, scanning stopped");
                    break;
                }
                _ = timer => {}
            }
            self.timer = None;

            // Cancellation may race the timer; never capture for a dead session.
            if !self.is_live() {
                tracing::debug!(session = self.id, "Timer fired after teardown, ignored");
                break;
            }

            match self.step() {
                Decision::Reschedule => self.schedule(),
                Decision::Halt => break,
            }
        }

        self.release_all();
    }

    /// Captures one frame, decodes it and applies the retry policy.
    fn step(&mut self) -> Decision {
        self.set_state(ScanState::Decoding);

        let Some(surface) = self.source.surface() else {
            return Decision::Halt;
        };
        let buffer = self.capture.capture(surface);
        let outcome = attempt(self.ctx.decoder.as_ref(), buffer);
        let kind = outcome.kind();
        if let Some(metrics) = &self.ctx.metrics {
            metrics.record_outcome(kind);
        }

        let decision = self.ctx.policy.decide(kind, self.source.is_live());
        match outcome {
            Outcome::Success(payload) => {
                tracing::info!(session = self.id, text = %payload.text, "Code decoded");
                (self.callback)(payload);
                if let Some(metrics) = &self.ctx.metrics {
                    metrics.record_delivery();
                }
            }
            failure => match decision {
                Decision::Reschedule => {
                    tracing::debug!(session = self.id, outcome = kind.label(), "No result, retrying");
                }
                Decision::Halt => {
                    if let Some(error) = failure.into_error() {
                        self.ctx.sink.report(ScanError::Decode(error));
                    }
                }
            },
        }

        if decision == Decision::Halt {
            tracing::info!(session = self.id, outcome = kind.label(), "Scanning halted");
        }
        decision
    }

    /// Arms the next attempt. Replacing the previous timer cancels it.
    fn schedule(&mut self) {
        self.timer = Some(Box::pin(tokio::time::sleep(self.ctx.delay)));
        self.set_state(ScanState::Waiting);
        tracing::debug!(
            session = self.id,
            delay_ms = self.ctx.delay.as_millis() as u64,
            "Next decode attempt scheduled"
        );
    }

    /// Drops the timer, releases the stream and the capture buffer together.
    fn release_all(&mut self) {
        self.timer = None;
        self.source.stop();
        self.capture.reset();
        self.set_state(ScanState::Idle);
    }

    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && self.source.is_live()
    }

    fn set_state(&self, state: ScanState) {
        self.ctx.state.send_replace(state);
        if let Some(metrics) = &self.ctx.metrics {
            metrics.set_state(state);
        }
    }
}
