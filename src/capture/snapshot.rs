//! Frame rasterization.

use super::{DisplaySurface, RasterBuffer};

/// Draws the surface's current frame into a cached [`RasterBuffer`].
///
/// The buffer is created on first use and recreated whenever the surface's
/// native geometry changes. Only [`FrameCapture::reset`] drops it otherwise.
#[derive(Debug, Default)]
pub struct FrameCapture {
    buffer: Option<RasterBuffer>,
    sequence: u64,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the current frame of `surface`.
    ///
    /// A surface reporting zero dimensions yields an empty buffer; decoders
    /// reject it like any other frame without a symbol.
    pub fn capture(&mut self, surface: &dyn DisplaySurface) -> &RasterBuffer {
        let (width, height) = surface.native_size();

        let buffer = match self.buffer.take() {
            Some(buffer) if buffer.has_dimensions(width, height) => buffer,
            previous => {
                if let Some(old) = previous {
                    tracing::debug!(
                        from = ?(old.width(), old.height()),
                        to = ?(width, height),
                        "Surface geometry changed, resizing capture buffer"
                    );
                }
                RasterBuffer::new(width, height)
            }
        };
        let buffer = self.buffer.insert(buffer);

        self.sequence += 1;
        if !buffer.is_empty() {
            surface.draw_frame(buffer);
        }
        buffer.mark_drawn(self.sequence);

        tracing::trace!(sequence = self.sequence, width, height, "Frame captured");
        buffer
    }

    /// The most recent capture, if any.
    pub fn last(&self) -> Option<&RasterBuffer> {
        self.buffer.as_ref()
    }

    /// Number of frames captured since creation or the last reset.
    pub fn captured(&self) -> u64 {
        self.sequence
    }

    /// Drops the cached buffer.
    pub fn reset(&mut self) {
        self.buffer = None;
        self.sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockStream, MockSurface};

    #[test]
    fn test_capture_sizes_buffer_to_surface() {
        let (mut surface, _controller) = MockSurface::manual(16, 8);
        surface.bind(&MockStream::new("mock-stream-1"));

        let mut capture = FrameCapture::new();
        let buffer = capture.capture(&surface);

        assert_eq!((buffer.width(), buffer.height()), (16, 8));
        assert_eq!(buffer.sequence(), 1);
        assert!(buffer.is_valid());
        assert_eq!(
            buffer.pixel(0, 0).map(|px| px[0]),
            Some(MockSurface::stream_tag("mock-stream-1"))
        );
    }

    #[test]
    fn test_capture_resizes_on_geometry_change() {
        let (mut surface, controller) = MockSurface::manual(16, 8);
        surface.bind(&MockStream::new("mock-stream-1"));

        let mut capture = FrameCapture::new();
        capture.capture(&surface);

        controller.resize(32, 24);
        let buffer = capture.capture(&surface);
        assert_eq!((buffer.width(), buffer.height()), (32, 24));
        assert_eq!(buffer.sequence(), 2);
    }

    #[test]
    fn test_unbound_surface_gives_empty_buffer() {
        let (surface, _controller) = MockSurface::manual(16, 8);

        let mut capture = FrameCapture::new();
        let buffer = capture.capture(&surface);

        assert!(buffer.is_empty());
        assert_eq!(surface.frames_drawn(), 0);
    }

    #[test]
    fn test_reset_drops_cache() {
        let (mut surface, _controller) = MockSurface::manual(4, 4);
        surface.bind(&MockStream::new("mock-stream-1"));

        let mut capture = FrameCapture::new();
        capture.capture(&surface);
        assert!(capture.last().is_some());

        capture.reset();
        assert!(capture.last().is_none());
        assert_eq!(capture.captured(), 0);
    }
}
