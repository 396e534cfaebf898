//! Recording session state machine.

use std::collections::VecDeque;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use trellis_core::{WorkflowHierarchyDebugSnapshot, WorkflowUpdateDebugInfo};

use super::config::RecordingConfig;
use crate::capture::{
    diff_snapshots, RecordedEvent, RecordingClock, SnapshotDiff, Timestamp, TimestampedEvent,
    TimestampedSnapshot,
};
use crate::error::Result;

/// State of the recording session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Not recording.
    Idle,
    /// Actively recording events and snapshots.
    Recording,
    /// Recording paused (can resume).
    Paused,
    /// Recording stopped (cannot resume, only export).
    Stopped,
}

/// Statistics for a recording session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_events: u64,
    pub total_snapshots: u64,
    /// Events evicted from the ring buffer.
    pub events_dropped: u64,
    /// Snapshots evicted from the ring buffer.
    pub snapshots_dropped: u64,
    /// Events rejected by the configuration's capture filters.
    pub events_filtered: u64,
    pub last_event_time: Option<Timestamp>,
    pub last_snapshot_time: Option<Timestamp>,
}

/// A recording session that captures workflow events and hierarchy snapshots.
pub struct RecordingSession {
    config: RecordingConfig,
    state: SessionState,
    clock: RecordingClock,
    events: VecDeque<TimestampedEvent>,
    snapshots: VecDeque<TimestampedSnapshot>,
    /// Kept outside the ring buffer so diffs survive eviction
    last_snapshot: Option<WorkflowHierarchyDebugSnapshot>,
    stats: SessionStats,
}

impl RecordingSession {
    pub fn new(config: RecordingConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            clock: RecordingClock::new(),
            events: VecDeque::new(),
            snapshots: VecDeque::new(),
            last_snapshot: None,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Start recording, or resume a paused session. A stopped session stays
    /// stopped until [`reset`](Self::reset).
    pub fn start(&mut self) {
        match self.state {
            SessionState::Idle => {
                self.clear();
                self.state = SessionState::Recording;
                tracing::debug!(app = %self.config.app_name, "recording started");
            }
            SessionState::Paused => {
                self.clock.resume();
                self.state = SessionState::Recording;
            }
            SessionState::Recording | SessionState::Stopped => {}
        }
    }

    pub fn pause(&mut self) {
        if self.state == SessionState::Recording {
            self.clock.pause();
            self.state = SessionState::Paused;
        }
    }

    pub fn stop(&mut self) {
        if matches!(self.state, SessionState::Recording | SessionState::Paused) {
            self.state = SessionState::Stopped;
            self.clock.pause();
            tracing::debug!(
                app = %self.config.app_name,
                events = self.stats.total_events,
                snapshots = self.stats.total_snapshots,
                "recording stopped"
            );
        }
    }

    /// Discard everything and return to idle.
    pub fn reset(&mut self) {
        self.clear();
        self.state = SessionState::Idle;
    }

    fn clear(&mut self) {
        self.events.clear();
        self.snapshots.clear();
        self.last_snapshot = None;
        self.clock.reset();
        self.stats = SessionStats::default();
    }

    /// Time since start, excluding pauses.
    pub fn current_timestamp(&self) -> Timestamp {
        self.clock.now()
    }

    /// Record an event. Ignored unless recording; dropped if the
    /// configuration does not capture its kind.
    pub fn record_event(&mut self, event: RecordedEvent) {
        if self.state != SessionState::Recording {
            return;
        }
        if !self.config.captures(&event) {
            self.stats.events_filtered += 1;
            return;
        }

        let timestamp = self.current_timestamp();
        let entry = TimestampedEvent::new(timestamp, event);
        if push_bounded(&mut self.events, entry, self.config.max_events) {
            self.stats.events_dropped += 1;
        }
        self.stats.total_events += 1;
        self.stats.last_event_time = Some(timestamp);
    }

    /// Record a committed render.
    ///
    /// The causing update, if any, is also recorded as an event. Returns the
    /// difference from the previously recorded snapshot.
    pub fn record_snapshot(
        &mut self,
        snapshot: WorkflowHierarchyDebugSnapshot,
        update: Option<WorkflowUpdateDebugInfo>,
    ) -> Option<SnapshotDiff> {
        if self.state != SessionState::Recording {
            return None;
        }
        if let Some(update) = &update {
            self.record_event(RecordedEvent::Update(update.clone()));
        }
        if !self.config.capture_snapshots {
            return None;
        }

        let timestamp = self.current_timestamp();
        let diff = self
            .last_snapshot
            .as_ref()
            .map(|last| diff_snapshots(last, &snapshot));

        self.last_snapshot = Some(snapshot.clone());
        let entry = TimestampedSnapshot::new(timestamp, snapshot, update);
        if push_bounded(&mut self.snapshots, entry, self.config.max_snapshots) {
            self.stats.snapshots_dropped += 1;
        }
        self.stats.total_snapshots += 1;
        self.stats.last_snapshot_time = Some(timestamp);

        diff
    }

    pub fn events(&self) -> &VecDeque<TimestampedEvent> {
        &self.events
    }

    pub fn snapshots(&self) -> &VecDeque<TimestampedSnapshot> {
        &self.snapshots
    }

    pub fn last_snapshot(&self) -> Option<&WorkflowHierarchyDebugSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Events of one kind, by [`RecordedEvent::event_type`] name.
    pub fn events_of_type<'a>(
        &'a self,
        event_type: &'a str,
    ) -> impl Iterator<Item = &'a TimestampedEvent> + 'a {
        self.events
            .iter()
            .filter(move |e| e.event.event_type() == event_type)
    }

    /// The latest snapshot taken at or before `timestamp`.
    pub fn snapshot_at(&self, timestamp: Timestamp) -> Option<&TimestampedSnapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.timestamp <= timestamp)
    }

    pub fn export(&self) -> RecordingExport {
        RecordingExport {
            config: self.config.clone(),
            events: self.events.iter().cloned().collect(),
            snapshots: self.snapshots.iter().cloned().collect(),
            stats: self.stats.clone(),
        }
    }
}

/// Append to a ring buffer holding at most `capacity` entries. Returns
/// whether the oldest entry was evicted.
fn push_bounded<T>(buffer: &mut VecDeque<T>, entry: T, capacity: usize) -> bool {
    let evicted = buffer.len() >= capacity.max(1) && buffer.pop_front().is_some();
    buffer.push_back(entry);
    evicted
}

/// Exported recording data for serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingExport {
    pub config: RecordingConfig,
    pub events: Vec<TimestampedEvent>,
    pub snapshots: Vec<TimestampedSnapshot>,
    pub stats: SessionStats,
}

impl RecordingExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the export as JSON to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json)?;
        tracing::debug!(path = %path.as_ref().display(), "recording saved");
        Ok(())
    }
}

/// Thread-safe wrapper around [`RecordingSession`].
pub struct SharedRecordingSession {
    inner: RwLock<RecordingSession>,
}

impl SharedRecordingSession {
    pub fn new(config: RecordingConfig) -> Self {
        Self {
            inner: RwLock::new(RecordingSession::new(config)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state()
    }

    pub fn start(&self) {
        self.inner.write().start();
    }

    pub fn stop(&self) {
        self.inner.write().stop();
    }

    pub fn record_event(&self, event: RecordedEvent) {
        self.inner.write().record_event(event);
    }

    pub fn record_snapshot(
        &self,
        snapshot: WorkflowHierarchyDebugSnapshot,
        update: Option<WorkflowUpdateDebugInfo>,
    ) -> Option<SnapshotDiff> {
        self.inner.write().record_snapshot(snapshot, update)
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.read().stats().clone()
    }

    pub fn export(&self) -> RecordingExport {
        self.inner.read().export()
    }

    pub fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RecordingSession) -> R,
    {
        f(&self.inner.read())
    }
}
