//! DJV Cache - Byte-budgeted frame cache for real-time playback
//!
//! This crate provides:
//! - [`FrameCache`]: the ordered working set of decoded frames
//! - [`CacheRef`]: one cached frame with its pin count
//! - [`FramePin`]: scoped pin that keeps a frame from being evicted
//! - [`CachePolicy`]: least-recently-used or playback-aware eviction
//! - Change notification for observers such as timeline widgets

pub mod cache;
pub mod cache_ref;
pub mod config;
pub mod notify;
pub mod pin;
pub mod policy;
pub mod stats;

pub use cache::FrameCache;
pub use cache_ref::CacheRef;
pub use config::CacheConfig;
pub use notify::ChangeNotifier;
pub use pin::FramePin;
pub use policy::{CachePolicy, Cursor, ParsePolicyError};
pub use stats::CacheStats;
