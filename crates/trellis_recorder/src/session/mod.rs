//! Session management for recordings.
//!
//! This module contains:
//! - `RecordingSession` - the recording state machine
//! - `RecordingConfig` - configuration presets for different use cases

mod config;
mod recording;

pub use config::*;
pub use recording::*;
