//! Capture module for recording workflow activity.
//!
//! This module contains the core types for capturing:
//! - Node lifecycle and render pass events
//! - Hierarchy snapshots and the differences between them
//! - Timestamps relative to session start

mod events;
mod primitives;
mod snapshot;

pub use events::*;
pub use primitives::*;
pub use snapshot::*;
