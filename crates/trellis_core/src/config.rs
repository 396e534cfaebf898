//! Host configuration presets.

use serde::{Deserialize, Serialize};

/// Configuration for a [`WorkflowHost`](crate::host::WorkflowHost).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name, attached to log records.
    pub name: String,
    /// Upper bound on events reduced by one `process_events` call. Events
    /// beyond it stay queued for the next call. Zero is treated as one.
    pub max_events_per_drain: usize,
    /// Whether an installed debugger receives a snapshot after each render.
    pub debug_snapshots: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl HostConfig {
    /// Standard configuration for general use.
    pub fn standard() -> Self {
        Self {
            name: "trellis_host".to_string(),
            max_events_per_drain: 1_024,
            debug_snapshots: false,
        }
    }

    /// Debug configuration: snapshots on every render.
    pub fn debug() -> Self {
        Self {
            name: "trellis_host".to_string(),
            max_events_per_drain: 1_024,
            debug_snapshots: true,
        }
    }

    /// Testing configuration: unbounded drains and snapshots on.
    pub fn testing() -> Self {
        Self {
            name: "trellis_test".to_string(),
            max_events_per_drain: usize::MAX,
            debug_snapshots: true,
        }
    }

    /// Set the host name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the per-drain event bound. Zero is treated as one.
    pub fn with_max_events_per_drain(mut self, max: usize) -> Self {
        self.max_events_per_drain = max.max(1);
        self
    }

    /// Effective per-drain bound, never less than one.
    pub fn drain_bound(&self) -> usize {
        self.max_events_per_drain.max(1)
    }

    /// Enable or disable debugger snapshots.
    pub fn with_debug_snapshots(mut self, enabled: bool) -> Self {
        self.debug_snapshots = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(HostConfig::default(), HostConfig::standard());
        assert!(!HostConfig::standard().debug_snapshots);
        assert!(HostConfig::debug().debug_snapshots);
        assert_eq!(HostConfig::testing().max_events_per_drain, usize::MAX);
    }

    #[test]
    fn test_builders() {
        let config = HostConfig::standard()
            .with_name("checkout")
            .with_max_events_per_drain(0)
            .with_debug_snapshots(true);
        assert_eq!(config.name, "checkout");
        assert_eq!(config.max_events_per_drain, 1);
        assert!(config.debug_snapshots);
    }

    #[test]
    fn test_config_from_json() {
        let config: HostConfig = serde_json::from_str(
            r#"{"name":"app","max_events_per_drain":8,"debug_snapshots":true}"#,
        )
        .unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.max_events_per_drain, 8);
        assert_eq!(config.drain_bound(), 8);
    }

    #[test]
    fn test_zero_drain_bound_from_json() {
        let config: HostConfig = serde_json::from_str(
            r#"{"name":"app","max_events_per_drain":0,"debug_snapshots":false}"#,
        )
        .unwrap();
        assert_eq!(config.max_events_per_drain, 0);
        assert_eq!(config.drain_bound(), 1);
    }
}
