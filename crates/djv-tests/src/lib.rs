//! Integration test crate for DJV.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives djv-media playback against the djv-cache frame cache.

#[cfg(test)]
mod playback;
