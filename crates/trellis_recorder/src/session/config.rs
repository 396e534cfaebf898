//! Recording configuration presets.

use serde::{Deserialize, Serialize};

use crate::capture::RecordedEvent;

/// Configuration for a recording session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Maximum number of events to store (ring buffer size).
    pub max_events: usize,
    /// Maximum number of hierarchy snapshots to store.
    pub max_snapshots: usize,
    /// Whether to record node started/finished events.
    pub capture_lifecycle: bool,
    /// Whether to record render pass events (noisy: two per node per render).
    pub capture_renders: bool,
    /// Whether to store a hierarchy snapshot per committed render.
    pub capture_snapshots: bool,
    /// Application name, carried into exports.
    pub app_name: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RecordingConfig {
    /// Standard configuration for general use.
    pub fn standard() -> Self {
        Self {
            max_events: 10_000,
            max_snapshots: 100,
            capture_lifecycle: true,
            capture_renders: false,
            capture_snapshots: true,
            app_name: "trellis_app".to_string(),
        }
    }

    /// Debug configuration with everything captured.
    pub fn debug() -> Self {
        Self {
            max_events: 50_000,
            max_snapshots: 500,
            capture_lifecycle: true,
            capture_renders: true,
            capture_snapshots: true,
            app_name: "trellis_app".to_string(),
        }
    }

    /// Minimal configuration: updates only.
    pub fn minimal() -> Self {
        Self {
            max_events: 1_000,
            max_snapshots: 10,
            capture_lifecycle: false,
            capture_renders: false,
            capture_snapshots: false,
            app_name: "trellis_app".to_string(),
        }
    }

    /// Testing configuration optimized for test runs.
    pub fn testing() -> Self {
        Self {
            max_events: 10_000,
            max_snapshots: 1_000,
            capture_lifecycle: true,
            capture_renders: true,
            capture_snapshots: true,
            app_name: "trellis_test".to_string(),
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    pub fn with_lifecycle(mut self, capture: bool) -> Self {
        self.capture_lifecycle = capture;
        self
    }

    pub fn with_renders(mut self, capture: bool) -> Self {
        self.capture_renders = capture;
        self
    }

    pub fn with_snapshots(mut self, capture: bool) -> Self {
        self.capture_snapshots = capture;
        self
    }

    /// Whether events of this kind are kept under this configuration.
    pub fn captures(&self, event: &RecordedEvent) -> bool {
        match event {
            RecordedEvent::NodeStarted(_) | RecordedEvent::NodeFinished(_) => {
                self.capture_lifecycle
            }
            RecordedEvent::RenderStarted(_) | RecordedEvent::RenderFinished(_) => {
                self.capture_renders
            }
            RecordedEvent::Update(_) | RecordedEvent::Custom(_) => true,
        }
    }
}
