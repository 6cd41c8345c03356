//! Camera stream ownership and frame rasterization.
//!
//! [`FrameSource`] acquires a stream through the platform's
//! [`MediaAcquisition`] capability and owns it until released;
//! [`FrameCapture`] turns the bound surface's current frame into a
//! [`RasterBuffer`] for decoding.

mod mock;
mod raster;
mod snapshot;
mod source;

pub use mock::{MockAcquisition, MockStream, MockSurface, SurfaceController};
pub use raster::{RasterBuffer, BYTES_PER_PIXEL};
pub use snapshot::FrameCapture;
pub use source::{
    DeviceId, DeviceInfo, DeviceKind, DisplaySurface, FacingMode, FrameSource, MediaAcquisition,
    MediaStream, PlatformError, PlatformErrorKind, SourceError, StreamHandle, StreamReady,
    SurfaceEvent, SurfaceSignals, VideoConstraint,
};
