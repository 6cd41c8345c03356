//! Stream acquisition and ownership.
//!
//! [`FrameSource`] is the only owner of a live camera stream. It asks the
//! platform for a stream, binds it to a display surface, waits for the
//! surface to report that playback started, and tears everything down again
//! on [`FrameSource::stop`] or drop.
//!
//! The platform is reached through three narrow traits so the scan loop can
//! be driven without real hardware: [`MediaAcquisition`] (camera access),
//! [`MediaStream`] (the acquired tracks) and [`DisplaySurface`] (the drawable
//! target that emits lifecycle signals).

use super::RasterBuffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifier of a camera device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of media device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// A media device reported by [`MediaAcquisition::enumerate_devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    /// Human readable label. May be empty before camera permission is granted.
    pub label: String,
    pub kind: DeviceKind,
}

/// Which way a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera, pointing away from the user.
    Environment,
    /// Front camera, pointing at the user.
    User,
}

/// Constraint passed to the platform when requesting a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoConstraint {
    /// Any camera facing the given direction.
    Facing(FacingMode),
    /// Exactly this device, or fail.
    ExactDevice(DeviceId),
}

impl VideoConstraint {
    /// Builds the constraint for an optional preferred device.
    ///
    /// Without a preference an environment-facing camera is requested.
    pub fn for_device(preferred: Option<&DeviceId>) -> Self {
        match preferred {
            Some(id) => Self::ExactDevice(id.clone()),
            None => Self::Facing(FacingMode::Environment),
        }
    }
}

/// Category of a platform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    PermissionDenied,
    DeviceNotFound,
    Other,
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission denied",
            Self::DeviceNotFound => "device not found",
            Self::Other => "platform error",
        };
        f.write_str(name)
    }
}

/// Error reported by the camera platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::PermissionDenied, message)
    }

    pub fn device_not_found(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::DeviceNotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Other, message)
    }
}

/// Errors raised while bringing a stream up.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("stream acquisition failed: {0}")]
    AcquisitionFailed(PlatformError),
    #[error("stream ended before playback started")]
    StreamEnded,
    #[error("display surface failed: {0}")]
    SurfaceFailed(PlatformError),
}

/// Lifecycle signal emitted by a [`DisplaySurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Stream metadata (geometry) is known; playback may be started.
    MetadataLoaded,
    /// Frames are flowing.
    Playing,
    /// The bound stream ended.
    Ended,
}

/// Subscription to a surface's lifecycle signals.
pub type SurfaceSignals = mpsc::UnboundedReceiver<SurfaceEvent>;

/// An acquired media stream.
pub trait MediaStream: Send + Sync {
    /// Platform identifier of the stream.
    fn id(&self) -> &str;

    /// True while at least one track is still delivering frames.
    fn is_active(&self) -> bool;

    /// Stops every track of the stream. Must be idempotent.
    fn stop_tracks(&mut self);
}

/// A drawable target a stream can be bound to.
pub trait DisplaySurface: Send {
    /// Subscribes to lifecycle signals. Signals sent before subscribing are lost.
    fn subscribe(&mut self) -> SurfaceSignals;

    /// Binds a stream as the surface's source.
    fn bind(&mut self, stream: &dyn MediaStream);

    /// Clears the bound source. Idempotent.
    fn clear(&mut self);

    /// Starts playback of the bound stream.
    fn play(&mut self) -> Result<(), PlatformError>;

    /// Native output resolution of the bound stream, `(0, 0)` when unbound.
    fn native_size(&self) -> (u32, u32);

    /// Draws the current frame into `target`, which already has the native size.
    fn draw_frame(&self, target: &mut RasterBuffer);
}

/// Platform camera access.
#[async_trait]
pub trait MediaAcquisition: Send + Sync {
    /// Requests a stream matching `constraint`.
    async fn request_stream(
        &self,
        constraint: &VideoConstraint,
    ) -> Result<Box<dyn MediaStream>, PlatformError>;

    /// Lists all media devices known to the platform.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError>;

    /// Creates a surface for callers that do not supply their own.
    fn create_surface(&self) -> Box<dyn DisplaySurface>;
}

/// Exclusive ownership of an active media stream.
///
/// Releasing stops all tracks; dropping an unreleased handle releases it.
pub struct StreamHandle {
    stream: Box<dyn MediaStream>,
    released: bool,
}

impl StreamHandle {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        self.stream.id()
    }

    pub fn stream(&self) -> &dyn MediaStream {
        self.stream.as_ref()
    }

    /// True until released or until the platform ends the stream.
    pub fn is_active(&self) -> bool {
        !self.released && self.stream.is_active()
    }

    /// Stops all tracks. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            self.stream.stop_tracks();
            self.released = true;
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.stream.id())
            .field("released", &self.released)
            .finish()
    }
}

/// Returned by [`FrameSource::start`] once frames are flowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReady {
    pub stream_id: String,
    pub width: u32,
    pub height: u32,
}

/// Owns the camera stream and the surface it is bound to.
pub struct FrameSource {
    acquisition: Arc<dyn MediaAcquisition>,
    surface: Option<Box<dyn DisplaySurface>>,
    stream: Option<StreamHandle>,
    signals: Option<SurfaceSignals>,
}

impl FrameSource {
    /// Creates a source. Without a surface one is created from `acquisition`
    /// when the stream starts.
    pub fn new(
        acquisition: Arc<dyn MediaAcquisition>,
        surface: Option<Box<dyn DisplaySurface>>,
    ) -> Self {
        Self {
            acquisition,
            surface,
            stream: None,
            signals: None,
        }
    }

    /// Acquires a stream and waits until the surface reports `Playing`.
    ///
    /// Stays pending for as long as the surface stays silent; callers that
    /// need a deadline wrap this in their own timeout.
    pub async fn start(
        &mut self,
        preferred_device: Option<&DeviceId>,
    ) -> Result<StreamReady, SourceError> {
        self.stop();

        let constraint = VideoConstraint::for_device(preferred_device);
        tracing::debug!(?constraint, "Requesting camera stream");
        let stream = self
            .acquisition
            .request_stream(&constraint)
            .await
            .map_err(SourceError::AcquisitionFailed)?;
        let handle = StreamHandle::new(stream);

        let acquisition = &self.acquisition;
        let surface = self
            .surface
            .get_or_insert_with(|| acquisition.create_surface());
        let mut signals = surface.subscribe();
        surface.bind(handle.stream());

        let stream_id = handle.id().to_owned();
        self.stream = Some(handle);
        tracing::info!(stream = %stream_id, "Camera stream acquired");

        if let Err(e) = await_playing(surface.as_mut(), &mut signals).await {
            tracing::warn!(stream = %stream_id, error = %e, "Stream failed before playback");
            self.stop();
            return Err(e);
        }

        let (width, height) = surface.native_size();
        self.signals = Some(signals);
        tracing::info!(stream = %stream_id, width, height, "Stream playing");

        Ok(StreamReady {
            stream_id,
            width,
            height,
        })
    }

    /// Resolves once the surface reports the stream ended.
    ///
    /// Pending forever while nothing is running or the stream stays live.
    /// Metadata that arrives after `Playing` still starts playback.
    pub async fn ended(&mut self) {
        let Some(signals) = self.signals.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            match signals.recv().await {
                Some(SurfaceEvent::Ended) => return,
                Some(SurfaceEvent::MetadataLoaded) => {
                    if let Some(surface) = self.surface.as_mut() {
                        if let Err(e) = surface.play() {
                            tracing::warn!("Failed to start playback on late metadata: {}", e);
                        }
                    }
                }
                Some(SurfaceEvent::Playing) => continue,
                None => return std::future::pending().await,
            }
        }
    }

    /// Releases the stream and clears the surface binding. Idempotent.
    pub fn stop(&mut self) {
        self.signals = None;
        if let Some(mut handle) = self.stream.take() {
            handle.release();
            tracing::info!(stream = %handle.id(), "Camera stream released");
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    /// True while a stream is held and still delivering frames.
    pub fn is_live(&self) -> bool {
        self.stream.as_ref().is_some_and(StreamHandle::is_active)
    }

    /// The bound surface, only while the stream is live.
    pub fn surface(&self) -> Option<&dyn DisplaySurface> {
        if !self.is_live() {
            return None;
        }
        self.surface.as_deref()
    }

    /// Lists video input devices, labelling unnamed ones.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError> {
        let devices = self.acquisition.enumerate_devices().await?;
        Ok(video_inputs(devices))
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("stream", &self.stream)
            .field("has_surface", &self.surface.is_some())
            .finish()
    }
}

/// Drives the surface from bound to playing.
///
/// `MetadataLoaded` starts playback; `Playing` alone decides readiness, in
/// whichever order the two arrive.
async fn await_playing(
    surface: &mut dyn DisplaySurface,
    signals: &mut SurfaceSignals,
) -> Result<(), SourceError> {
    loop {
        match signals.recv().await {
            Some(SurfaceEvent::MetadataLoaded) => {
                surface.play().map_err(SourceError::SurfaceFailed)?;
            }
            Some(SurfaceEvent::Playing) => return Ok(()),
            Some(SurfaceEvent::Ended) => return Err(SourceError::StreamEnded),
            None => return std::future::pending().await,
        }
    }
}

/// Keeps video inputs and gives unlabeled devices a stable name.
pub(crate) fn video_inputs(devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    devices
        .into_iter()
        .filter(|d| d.kind == DeviceKind::VideoInput)
        .enumerate()
        .map(|(n, mut device)| {
            if device.label.is_empty() {
                device.label = format!("Video device {}", n + 1);
            }
            device
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockAcquisition, MockSurface};
    use std::time::Duration;

    #[test]
    fn test_constraint_prefers_environment_camera() {
        assert_eq!(
            VideoConstraint::for_device(None),
            VideoConstraint::Facing(FacingMode::Environment)
        );
        let id = DeviceId::from("cam-2");
        assert_eq!(
            VideoConstraint::for_device(Some(&id)),
            VideoConstraint::ExactDevice(id)
        );
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let acquisition = Arc::new(MockAcquisition::new());
        let mut source = FrameSource::new(acquisition.clone(), None);

        assert!(!source.is_live());
        let ready = source.start(None).await.unwrap();
        assert_eq!((ready.width, ready.height), (64, 48));
        assert!(source.is_live());
        assert!(source.surface().is_some());
        assert_eq!(acquisition.live_streams(), 1);

        source.stop();
        assert!(!source.is_live());
        assert!(source.surface().is_none());
        assert_eq!(acquisition.live_streams(), 0);

        // Idempotent.
        source.stop();
        assert_eq!(acquisition.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_acquisition_failure_is_reported() {
        let acquisition = Arc::new(MockAcquisition::failing(PlatformError::permission_denied(
            "user dismissed prompt",
        )));
        let mut source = FrameSource::new(acquisition.clone(), None);

        let err = source.start(None).await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::AcquisitionFailed(PlatformError {
                kind: PlatformErrorKind::PermissionDenied,
                ..
            })
        ));
        assert_eq!(acquisition.requests(), 1);
        assert!(!source.is_live());
    }

    #[tokio::test]
    async fn test_exact_device_must_exist() {
        let acquisition = Arc::new(MockAcquisition::new());
        let mut source = FrameSource::new(acquisition, None);

        let missing = DeviceId::from("no-such-camera");
        let err = source.start(Some(&missing)).await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::AcquisitionFailed(PlatformError {
                kind: PlatformErrorKind::DeviceNotFound,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_playing_before_metadata_is_ready() {
        let acquisition = Arc::new(MockAcquisition::new());
        let (surface, controller) = MockSurface::manual(32, 32);
        let mut source = FrameSource::new(acquisition, Some(Box::new(surface)));

        controller.emit(SurfaceEvent::Playing);
        let ready = source.start(None).await.unwrap();
        assert_eq!((ready.width, ready.height), (32, 32));
        assert_eq!(controller.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_metadata_after_playing_starts_playback() {
        let acquisition = Arc::new(MockAcquisition::new());
        let (surface, controller) = MockSurface::manual(32, 32);
        let mut source = FrameSource::new(acquisition, Some(Box::new(surface)));

        controller.emit(SurfaceEvent::Playing);
        source.start(None).await.unwrap();
        assert_eq!(controller.play_calls(), 0);

        controller.emit(SurfaceEvent::MetadataLoaded);
        controller.emit(SurfaceEvent::Ended);
        source.ended().await;
        assert_eq!(controller.play_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_surface_stays_pending() {
        let acquisition = Arc::new(MockAcquisition::new());
        let (surface, _controller) = MockSurface::manual(32, 32);
        let mut source = FrameSource::new(acquisition.clone(), Some(Box::new(surface)));

        let result = tokio::time::timeout(Duration::from_secs(30), source.start(None)).await;
        assert!(result.is_err());
        drop(source);
        assert_eq!(acquisition.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_ended_before_playing_releases_stream() {
        let acquisition = Arc::new(MockAcquisition::new());
        let (surface, controller) = MockSurface::manual(32, 32);
        let mut source = FrameSource::new(acquisition.clone(), Some(Box::new(surface)));

        controller.emit(SurfaceEvent::Ended);
        let err = source.start(None).await.unwrap_err();
        assert!(matches!(err, SourceError::StreamEnded));
        assert_eq!(acquisition.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_list_devices_filters_and_labels() {
        let acquisition = Arc::new(MockAcquisition::with_devices(vec![
            DeviceInfo {
                id: "mic".into(),
                label: "Microphone".into(),
                kind: DeviceKind::AudioInput,
            },
            DeviceInfo {
                id: "cam-a".into(),
                label: String::new(),
                kind: DeviceKind::VideoInput,
            },
            DeviceInfo {
                id: "cam-b".into(),
                label: "Rear".into(),
                kind: DeviceKind::VideoInput,
            },
        ]));
        let source = FrameSource::new(acquisition, None);

        let devices = source.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].label, "Video device 1");
        assert_eq!(devices[1].label, "Rear");
    }
}
