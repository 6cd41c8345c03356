//! Raster buffer holding one rasterized video frame.

use std::time::Instant;

/// Bytes per pixel in a [`RasterBuffer`] (RGBA, 8 bits per channel).
pub const BYTES_PER_PIXEL: usize = 4;

/// A 2D RGBA pixel buffer sized to the source's native resolution.
///
/// Owned by [`FrameCapture`](super::FrameCapture) and lent to decoders by
/// shared reference, so a decoder can never mutate the frame it inspects.
#[derive(Clone)]
pub struct RasterBuffer {
    /// Row-major RGBA pixel data.
    pixels: Vec<u8>,
    /// Buffer width in pixels.
    width: u32,
    /// Buffer height in pixels.
    height: u32,
    /// Time the current contents were drawn.
    timestamp: Instant,
    /// Monotonic capture sequence number.
    sequence: u64,
}

impl RasterBuffer {
    /// Creates a zero-filled buffer with the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * BYTES_PER_PIXEL;
        Self {
            pixels: vec![0u8; len],
            width,
            height,
            timestamp: Instant::now(),
            sequence: 0,
        }
    }

    /// Returns the raw RGBA pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access to the pixel data, used by surfaces when drawing.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the time the current contents were drawn.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the capture sequence number of the current contents.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True when either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// True if the buffer already has the given geometry.
    #[inline]
    pub fn has_dimensions(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * BYTES_PER_PIXEL
    }

    /// Returns the RGBA value at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Converts the buffer to 8-bit luminance (ITU-R BT.601 weights).
    ///
    /// Most symbol decoders binarize a grayscale image, so this is the
    /// usual entry point for a [`Decoder`](crate::decode::Decoder).
    pub fn luminance(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| {
                let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((r * 299 + g * 587 + b * 114 + 500) / 1000) as u8
            })
            .collect()
    }

    /// Stamps the buffer after a draw.
    pub(crate) fn mark_drawn(&mut self, sequence: u64) {
        self.sequence = sequence;
        self.timestamp = Instant::now();
    }
}

impl std::fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buffer = RasterBuffer::new(640, 480);

        assert_eq!(buffer.width(), 640);
        assert_eq!(buffer.height(), 480);
        assert_eq!(buffer.sequence(), 0);
        assert_eq!(buffer.pixels().len(), 640 * 480 * 4);
        assert!(buffer.is_valid());
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_zero_sized_buffer() {
        let buffer = RasterBuffer::new(0, 480);
        assert!(buffer.is_empty());
        assert!(buffer.is_valid());
        assert!(buffer.luminance().is_empty());
        assert_eq!(buffer.pixel(0, 0), None);
    }

    #[test]
    fn test_luminance_weights() {
        let mut buffer = RasterBuffer::new(3, 1);
        buffer
            .pixels_mut()
            .copy_from_slice(&[255, 255, 255, 255, 0, 0, 0, 255, 255, 0, 0, 255]);

        assert_eq!(buffer.luminance(), vec![255, 0, 76]);
        assert_eq!(buffer.pixel(2, 0), Some([255, 0, 0, 255]));
    }
}
