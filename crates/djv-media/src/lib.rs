//! DJV Media - Frame loading and playback driving
//!
//! This crate handles:
//! - Image sequence loading behind the [`FrameLoader`] trait
//! - Background decoding with cancellable requests
//! - Playback that keeps the frame cache cursor on the playhead

pub mod loader;
pub mod playback;
pub mod worker;

pub use loader::{FrameLoader, SequenceLoader};
pub use playback::Playback;
pub use worker::{DecodeWorker, Decoded};

/// Initialize the media subsystem (call once at startup).
pub fn init() {
    tracing::info!("DJV Media initialized");
}
