//! Public scan loop handle.

use super::session::{ScanCallback, ScanSession, SessionContext};
use super::{ConfigError, ErrorSink, LogSink, RetryPolicy, ScanConfig, ScanError, ScanState};
use crate::capture::{DeviceId, DeviceInfo, DisplaySurface, FrameSource, MediaAcquisition};
use crate::decode::{Decoder, Payload};
use crate::metrics::ScanMetrics;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The running session, as seen from the loop.
struct SessionHandle {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Continuously decodes codes from a camera stream.
///
/// Each call to [`ScanLoop::decode_from_input_video_device`] tears down the
/// previous session and starts a new one on the current tokio runtime.
/// Payloads go to the caller's callback; errors that stop a session go to
/// the configured [`ErrorSink`] (logged by default).
pub struct ScanLoop {
    acquisition: Arc<dyn MediaAcquisition>,
    decoder: Arc<dyn Decoder>,
    config: ScanConfig,
    sink: Arc<dyn ErrorSink>,
    metrics: Option<ScanMetrics>,
    state: Arc<watch::Sender<ScanState>>,
    session: Option<SessionHandle>,
    sessions_started: u64,
}

impl ScanLoop {
    /// Creates a loop with the default configuration (500 ms between scans).
    pub fn new(acquisition: Arc<dyn MediaAcquisition>, decoder: Arc<dyn Decoder>) -> Self {
        Self::build(acquisition, decoder, ScanConfig::default())
    }

    /// Creates a loop with `config`, rejecting an out-of-range interval.
    pub fn with_config(
        acquisition: Arc<dyn MediaAcquisition>,
        decoder: Arc<dyn Decoder>,
        config: ScanConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(acquisition, decoder, config))
    }

    fn build(
        acquisition: Arc<dyn MediaAcquisition>,
        decoder: Arc<dyn Decoder>,
        config: ScanConfig,
    ) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            acquisition,
            decoder,
            config,
            sink: Arc::new(LogSink),
            metrics: None,
            state: Arc::new(state),
            session: None,
            sessions_started: 0,
        }
    }

    /// Routes session-stopping errors to `sink` instead of the log.
    pub fn with_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: ScanMetrics) -> Self {
        metrics.set_state(self.state());
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn time_between_scans(&self) -> Duration {
        self.config.time_between_scans()
    }

    /// Replaces the retry policy used by sessions started afterwards.
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.config.retry = policy;
    }

    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// True while the next attempt is scheduled.
    pub fn has_pending_timer(&self) -> bool {
        self.state() == ScanState::Waiting
    }

    /// True while a session task is still advancing.
    pub fn is_scanning(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    /// Starts continuous scanning.
    ///
    /// Any running session is reset first. Without `device_id` an
    /// environment-facing camera is preferred; without `surface` one is
    /// created by the acquisition backend. `callback` runs once per decoded
    /// payload. Returns as soon as the session is started; acquisition
    /// failures are reported to the error sink.
    pub async fn decode_from_input_video_device<F>(
        &mut self,
        callback: F,
        device_id: Option<DeviceId>,
        surface: Option<Box<dyn DisplaySurface>>,
    ) where
        F: FnMut(Payload) + Send + 'static,
    {
        let policy = self.config.retry;
        let sink = self.sink.clone();
        self.start_session(Box::new(callback), device_id, surface, policy, sink)
            .await;
    }

    /// Scans until the first payload, then releases the camera.
    ///
    /// Resolves with the first error that stops the session instead, or
    /// with [`ScanError::SessionEnded`] if the stream ends first.
    pub async fn decode_once_from_input_video_device(
        &mut self,
        device_id: Option<DeviceId>,
        surface: Option<Box<dyn DisplaySurface>>,
    ) -> Result<Payload, ScanError> {
        let (tx, rx) = oneshot::channel();
        let slot: ResultSlot = Arc::new(Mutex::new(Some(tx)));

        let on_payload = {
            let slot = slot.clone();
            move |payload: Payload| {
                let _ = fill(&slot, Ok(payload));
            }
        };
        let sink = OnceSink {
            slot,
            fallback: self.sink.clone(),
        };
        let policy = RetryPolicy {
            single_shot: true,
            ..self.config.retry
        };

        self.start_session(
            Box::new(on_payload),
            device_id,
            surface,
            policy,
            Arc::new(sink),
        )
        .await;

        let result = rx.await.unwrap_or(Err(ScanError::SessionEnded));
        self.reset().await;
        result
    }

    /// Lists the platform's video input devices.
    pub async fn list_video_input_devices(&self) -> Result<Vec<DeviceInfo>, ScanError> {
        FrameSource::new(self.acquisition.clone(), None)
            .list_devices()
            .await
            .map_err(ScanError::Enumerate)
    }

    /// Stops scanning and releases the stream, timer and surface binding.
    ///
    /// Safe to call at any time, any number of times. When it returns the
    /// previous session has fully torn down.
    pub async fn reset(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.cancel.cancel();
        if let Err(e) = session.task.await {
            if e.is_panic() {
                tracing::warn!(session = session.id, "Scan session panicked");
            }
        }
        self.set_state(ScanState::Idle);
        tracing::info!(session = session.id, "Scan session reset");
    }

    async fn start_session(
        &mut self,
        callback: ScanCallback,
        device_id: Option<DeviceId>,
        surface: Option<Box<dyn DisplaySurface>>,
        policy: RetryPolicy,
        sink: Arc<dyn ErrorSink>,
    ) {
        self.reset().await;

        self.sessions_started += 1;
        let id = self.sessions_started;
        let cancel = CancellationToken::new();
        let ctx = SessionContext {
            decoder: self.decoder.clone(),
            sink,
            metrics: self.metrics.clone(),
            state: self.state.clone(),
            delay: self.config.time_between_scans(),
            policy,
        };
        let source = FrameSource::new(self.acquisition.clone(), surface);
        let session = ScanSession::new(id, source, callback, ctx, cancel.clone());

        if let Some(metrics) = &self.metrics {
            metrics.record_session_started();
        }
        self.set_state(ScanState::Acquiring);
        tracing::info!(
            session = id,
            device = ?device_id,
            delay_ms = self.config.time_between_scans_ms,
            "Starting scan session"
        );

        let span = tracing::info_span!("scan_session", session = id);
        let task = tokio::spawn(session.run(device_id).instrument(span));
        self.session = Some(SessionHandle { id, cancel, task });
    }

    fn set_state(&self, state: ScanState) {
        self.state.send_replace(state);
        if let Some(metrics) = &self.metrics {
            metrics.set_state(state);
        }
    }
}

impl Drop for ScanLoop {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            session.task.abort();
        }
    }
}

impl std::fmt::Debug for ScanLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanLoop")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("session", &self.session.as_ref().map(|s| s.id))
            .finish()
    }
}

type ResultSlot = Arc<Mutex<Option<oneshot::Sender<Result<Payload, ScanError>>>>>;

/// Delivers the single result of a one-shot scan. Returns false if a result
/// was already delivered.
fn fill(slot: &ResultSlot, result: Result<Payload, ScanError>) -> bool {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
            true
        }
        None => false,
    }
}

/// Error sink of a one-shot scan: the first error becomes the result.
struct OnceSink {
    slot: ResultSlot,
    fallback: Arc<dyn ErrorSink>,
}

impl ErrorSink for OnceSink {
    fn report(&self, error: ScanError) {
        if !fill(&self.slot, Err(error.clone())) {
            self.fallback.report(error);
        }
    }
}
