//! In-memory camera platform for testing and demos.
//!
//! [`MockAcquisition`] hands out [`MockStream`]s and counts how many are
//! live. [`MockSurface`] renders a synthetic pattern tagged with the bound
//! stream's identity so tests can tell which stream a frame came from.

use super::source::{
    DeviceId, DeviceInfo, DeviceKind, DisplaySurface, MediaAcquisition, MediaStream,
    PlatformError, SurfaceEvent, SurfaceSignals, VideoConstraint,
};
use super::RasterBuffer;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// A fake media stream.
#[derive(Debug)]
pub struct MockStream {
    id: String,
    active: AtomicBool,
    live_counter: Option<Arc<AtomicUsize>>,
}

impl MockStream {
    /// Creates a stream that is not tracked by any acquisition.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: AtomicBool::new(true),
            live_counter: None,
        }
    }

    fn tracked(id: String, live_counter: Arc<AtomicUsize>) -> Self {
        live_counter.fetch_add(1, Ordering::SeqCst);
        Self {
            id,
            active: AtomicBool::new(true),
            live_counter: Some(live_counter),
        }
    }
}

impl MediaStream for MockStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop_tracks(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(counter) = &self.live_counter {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

/// Fake camera platform.
#[derive(Debug)]
pub struct MockAcquisition {
    devices: Vec<DeviceInfo>,
    failure: Option<PlatformError>,
    surface_size: (u32, u32),
    requests: AtomicUsize,
    live_streams: Arc<AtomicUsize>,
    next_stream: AtomicU64,
}

impl MockAcquisition {
    /// A platform with one environment-facing camera (`mock-camera-0`)
    /// producing 64x48 frames.
    pub fn new() -> Self {
        Self::with_devices(vec![DeviceInfo {
            id: DeviceId::from("mock-camera-0"),
            label: "Mock camera".into(),
            kind: DeviceKind::VideoInput,
        }])
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            failure: None,
            surface_size: (64, 48),
            requests: AtomicUsize::new(0),
            live_streams: Arc::new(AtomicUsize::new(0)),
            next_stream: AtomicU64::new(0),
        }
    }

    /// A platform that rejects every stream request with `error`.
    pub fn failing(error: PlatformError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    /// Sets the geometry of surfaces created by [`MediaAcquisition::create_surface`].
    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.surface_size = (width, height);
        self
    }

    /// Number of stream requests received.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of streams handed out and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

impl Default for MockAcquisition {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaAcquisition for MockAcquisition {
    async fn request_stream(
        &self,
        constraint: &VideoConstraint,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let has_camera = self.devices.iter().any(|d| d.kind == DeviceKind::VideoInput);
        match constraint {
            VideoConstraint::ExactDevice(id)
                if !self
                    .devices
                    .iter()
                    .any(|d| d.kind == DeviceKind::VideoInput && &d.id == id) =>
            {
                return Err(PlatformError::device_not_found(format!(
                    "no video input with id {id}"
                )));
            }
            VideoConstraint::Facing(_) if !has_camera => {
                return Err(PlatformError::device_not_found("no video input available"));
            }
            _ => {}
        }

        let n = self.next_stream.fetch_add(1, Ordering::SeqCst) + 1;
        let stream = MockStream::tracked(format!("mock-stream-{n}"), self.live_streams.clone());
        Ok(Box::new(stream))
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError> {
        Ok(self.devices.clone())
    }

    fn create_surface(&self) -> Box<dyn DisplaySurface> {
        let (width, height) = self.surface_size;
        Box::new(MockSurface::auto(width, height))
    }
}

#[derive(Debug, Default)]
struct SurfaceShared {
    subscribers: Vec<mpsc::UnboundedSender<SurfaceEvent>>,
    backlog: Vec<SurfaceEvent>,
    bound: Option<String>,
}

#[derive(Debug)]
struct SurfaceState {
    shared: Mutex<SurfaceShared>,
    width: AtomicU32,
    height: AtomicU32,
    play_calls: AtomicUsize,
    frames_drawn: AtomicU64,
}

impl SurfaceState {
    fn lock(&self) -> MutexGuard<'_, SurfaceShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SurfaceEvent) {
        let mut shared = self.lock();
        shared.subscribers.retain(|tx| !tx.is_closed());
        if shared.subscribers.is_empty() {
            shared.backlog.push(event);
            return;
        }
        for tx in &shared.subscribers {
            let _ = tx.send(event);
        }
    }
}

/// Fake display surface.
///
/// In automatic mode binding a stream emits `MetadataLoaded` and `play()`
/// emits `Playing`, like a well-behaved video element. In manual mode the
/// paired [`SurfaceController`] decides which signals fire and when; events
/// emitted before anyone subscribes are queued for the first subscriber.
#[derive(Debug)]
pub struct MockSurface {
    state: Arc<SurfaceState>,
    automatic: bool,
}

impl MockSurface {
    /// A surface that signals readiness on its own.
    pub fn auto(width: u32, height: u32) -> Self {
        Self::build(width, height, true)
    }

    /// A surface whose signals are driven by the returned controller.
    pub fn manual(width: u32, height: u32) -> (Self, SurfaceController) {
        let surface = Self::build(width, height, false);
        let controller = SurfaceController {
            state: surface.state.clone(),
        };
        (surface, controller)
    }

    fn build(width: u32, height: u32, automatic: bool) -> Self {
        Self {
            state: Arc::new(SurfaceState {
                shared: Mutex::new(SurfaceShared::default()),
                width: AtomicU32::new(width),
                height: AtomicU32::new(height),
                play_calls: AtomicUsize::new(0),
                frames_drawn: AtomicU64::new(0),
            }),
            automatic,
        }
    }

    /// Red-channel value painted into every frame of the stream `id`.
    pub fn stream_tag(id: &str) -> u8 {
        let sum: u32 = id.bytes().map(u32::from).sum();
        (sum % 251) as u8 + 1
    }

    /// Number of frames drawn so far.
    pub fn frames_drawn(&self) -> u64 {
        self.state.frames_drawn.load(Ordering::SeqCst)
    }
}

impl DisplaySurface for MockSurface {
    fn subscribe(&mut self) -> SurfaceSignals {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.state.lock();
        for event in shared.backlog.drain(..) {
            let _ = tx.send(event);
        }
        shared.subscribers.push(tx);
        rx
    }

    fn bind(&mut self, stream: &dyn MediaStream) {
        self.state.lock().bound = Some(stream.id().to_owned());
        if self.automatic {
            self.state.emit(SurfaceEvent::MetadataLoaded);
        }
    }

    fn clear(&mut self) {
        self.state.lock().bound = None;
    }

    fn play(&mut self) -> Result<(), PlatformError> {
        self.state.play_calls.fetch_add(1, Ordering::SeqCst);
        if self.automatic {
            self.state.emit(SurfaceEvent::Playing);
        }
        Ok(())
    }

    fn native_size(&self) -> (u32, u32) {
        if self.state.lock().bound.is_none() {
            return (0, 0);
        }
        (
            self.state.width.load(Ordering::SeqCst),
            self.state.height.load(Ordering::SeqCst),
        )
    }

    fn draw_frame(&self, target: &mut RasterBuffer) {
        let Some(tag) = self.state.lock().bound.as_deref().map(Self::stream_tag) else {
            return;
        };
        let frame = self.state.frames_drawn.fetch_add(1, Ordering::SeqCst) + 1;
        let width = target.width() as usize;
        for (i, px) in target.pixels_mut().chunks_exact_mut(4).enumerate() {
            let (x, y) = (i % width.max(1), i / width.max(1));
            px[0] = tag;
            px[1] = ((x ^ y) & 0xFF) as u8;
            px[2] = (frame & 0xFF) as u8;
            px[3] = 0xFF;
        }
    }
}

/// Drives a manual [`MockSurface`] from a test.
#[derive(Debug, Clone)]
pub struct SurfaceController {
    state: Arc<SurfaceState>,
}

impl SurfaceController {
    /// Emits a lifecycle signal to current subscribers.
    pub fn emit(&self, event: SurfaceEvent) {
        self.state.emit(event);
    }

    /// Emits `MetadataLoaded` followed by `Playing`.
    pub fn ready(&self) {
        self.emit(SurfaceEvent::MetadataLoaded);
        self.emit(SurfaceEvent::Playing);
    }

    /// Changes the native geometry reported by the surface.
    pub fn resize(&self, width: u32, height: u32) {
        self.state.width.store(width, Ordering::SeqCst);
        self.state.height.store(height, Ordering::SeqCst);
    }

    /// Id of the stream currently bound, if any.
    pub fn bound_stream(&self) -> Option<String> {
        self.state.lock().bound.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.play_calls.load(Ordering::SeqCst)
    }

    pub fn frames_drawn(&self) -> u64 {
        self.state.frames_drawn.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_streams_are_counted_until_stopped() {
        let acquisition = MockAcquisition::new();
        let constraint = VideoConstraint::for_device(None);

        let mut first = acquisition.request_stream(&constraint).await.unwrap();
        let second = acquisition.request_stream(&constraint).await.unwrap();
        assert_eq!(acquisition.live_streams(), 2);
        assert_ne!(first.id(), second.id());

        first.stop_tracks();
        first.stop_tracks();
        assert_eq!(acquisition.live_streams(), 1);
        assert!(!first.is_active());
        assert!(second.is_active());
    }

    #[test]
    fn test_auto_surface_signals_in_order() {
        let mut surface = MockSurface::auto(8, 8);
        let mut signals = surface.subscribe();

        surface.bind(&MockStream::new("s"));
        surface.play().unwrap();

        assert_eq!(signals.try_recv().unwrap(), SurfaceEvent::MetadataLoaded);
        assert_eq!(signals.try_recv().unwrap(), SurfaceEvent::Playing);
        assert!(signals.try_recv().is_err());
    }

    #[test]
    fn test_manual_backlog_flushes_on_subscribe() {
        let (mut surface, controller) = MockSurface::manual(8, 8);
        controller.emit(SurfaceEvent::Playing);

        let mut signals = surface.subscribe();
        assert_eq!(signals.try_recv().unwrap(), SurfaceEvent::Playing);
    }
}
