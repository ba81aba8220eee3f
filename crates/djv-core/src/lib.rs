//! DJV Core - Foundation types for image sequence playback
//!
//! This crate provides the fundamental types shared by the cache, the media
//! collaborators and the application:
//! - Frame buffers and pixel formats
//! - Opaque stream identities used as cache keys
//! - Error types
//! - Cache budget presets

pub mod error;
pub mod frame;
pub mod key;

pub use error::{DjvError, Result};
pub use frame::{FrameBuffer, FramePlane, PixelFormat, SharedFrameBuffer};
pub use key::StreamKey;

/// Frame cache budget presets offered by the preferences collaborator.
pub mod cache_presets {
    /// Bytes per megabyte as used by every cache budget.
    pub const MEGABYTE: usize = 1024 * 1024;

    /// Selectable cache sizes in megabytes.
    pub const CACHE_SIZES_MB: [usize; 7] = [64, 128, 256, 512, 1024, 2048, 4096];

    /// Default cache size (512 MB). Holds ~60 1080p RGBA frames.
    pub const DEFAULT_CACHE_MB: usize = 512;

    /// Number of frames to buffer ahead of the playhead.
    pub const LOOKAHEAD_FRAMES: usize = 8;

    /// Convert a megabyte budget to bytes, saturating on overflow.
    #[inline]
    pub fn megabytes_to_bytes(megabytes: usize) -> usize {
        megabytes.saturating_mul(MEGABYTE)
    }
}
