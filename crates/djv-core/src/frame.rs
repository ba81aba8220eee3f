//! Decoded frame buffers in CPU memory.
//!
//! These are the pixel buffers produced by image loaders and owned by the
//! frame cache. The cache charges each buffer's [`FrameBuffer::memory_size`]
//! against its byte budget.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit luminance
    L8,
    /// 16-bit luminance
    L16,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 10-bit RGB packed into 32 bits (Cineon/DPX)
    Rgb10,
    /// 16-bit integer RGBA
    Rgba16,
    /// 16-bit RGBA half-float
    Rgba16F,
    /// 32-bit RGBA float
    Rgba32F,
    /// YUV 4:2:0 planar (movie sources)
    Yuv420P,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, or bytes per luma sample for planar.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::L8 | Self::Yuv420P => 1,
            Self::L16 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Rgb10 => 4,
            Self::Rgba16 | Self::Rgba16F => 8,
            Self::Rgba32F => 16,
        }
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a zeroed plane with rows aligned to 64 bytes.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let min_stride = width as usize * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }

    /// Bytes per pixel of this plane.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }
}

/// A decoded image in CPU memory.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data planes (1 or 3 depending on format)
    pub planes: SmallVec<[FramePlane; 3]>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = match format {
            PixelFormat::Yuv420P => smallvec::smallvec![
                FramePlane::new(width, height, 1),         // Y
                FramePlane::new(width / 2, height / 2, 1), // U
                FramePlane::new(width / 2, height / 2, 1), // V
            ],
            packed => smallvec::smallvec![FramePlane::new(width, height, packed.bytes_per_pixel())],
        };

        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// A buffer with no pixel storage cannot be cached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memory_size() == 0
    }

    /// Create a color-bar frame whose bars are rotated by `frame`, so
    /// neighbouring frames of a sequence are distinguishable.
    ///
    /// RGBA8 frames get the bar colors; other packed formats get their
    /// luminance in every byte. Planar chroma is left neutral.
    pub fn test_pattern(width: u32, height: u32, format: PixelFormat, frame: i64) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        let mut buffer = Self::new(width, height, format);
        let shift = frame.rem_euclid(BARS.len() as i64) as usize;
        for (index, plane) in buffer.planes.iter_mut().enumerate() {
            let plane_width = plane.width as usize;
            let bytes_per_pixel = plane.bytes_per_pixel();
            if plane_width == 0 {
                continue;
            }
            for y in 0..plane.height {
                let row = plane.row_mut(y);
                for (x, pixel) in row.chunks_exact_mut(bytes_per_pixel).enumerate() {
                    let bar = BARS[(x * BARS.len() / plane_width + shift) % BARS.len()];
                    match (format, index) {
                        (PixelFormat::Rgba8, _) => pixel.copy_from_slice(&bar),
                        (PixelFormat::Yuv420P, 1 | 2) => pixel.fill(128),
                        _ => pixel.fill(luma(bar)),
                    }
                }
            }
        }
        buffer
    }
}

/// Rec. 601 luma of an RGB triple, in 8-bit fixed point.
fn luma([r, g, b, _]: [u8; 4]) -> u8 {
    let y = (u32::from(r) * 77 + u32::from(g) * 150 + u32::from(b) * 29) >> 8;
    y as u8
}

/// Arc-wrapped frame buffer for shared read access.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
