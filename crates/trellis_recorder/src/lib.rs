//! trellis_recorder - Recording and debugging infrastructure for Trellis.
//!
//! This crate provides:
//! - Lifecycle and render pass recording through a [`WorkflowObserver`]
//! - Hierarchy snapshot capture, paired with the update that caused each
//!   render, through the host debugger hook
//! - Session management with start/pause/stop lifecycle and JSON export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use trellis_core::{HostConfig, WorkflowHost};
//! use trellis_recorder::{attach, RecordingConfig, SharedRecordingSession, WorkflowRecorder};
//!
//! let session = Arc::new(SharedRecordingSession::new(RecordingConfig::debug()));
//! session.start();
//!
//! let recorder = Rc::new(WorkflowRecorder::new(session.clone()));
//! let mut host = WorkflowHost::with_observer(App, HostConfig::debug(), recorder);
//! attach(&mut host, session.clone());
//!
//! // ... drive the host ...
//!
//! session.stop();
//! session.export().save("recording.json")?;
//! ```

pub mod capture;
pub mod error;
pub mod session;

pub use capture::{
    diff_snapshots, CustomEvent, NodeEvent, RecordedEvent, RecordingClock, RenderEvent,
    SnapshotDiff, StateChange, Timestamp, TimestampedEvent, TimestampedSnapshot,
};
pub use error::{RecorderError, Result};
pub use session::{
    RecordingConfig, RecordingExport, RecordingSession, SessionState, SessionStats,
    SharedRecordingSession,
};

use std::sync::Arc;

use trellis_core::{NodeInfo, Workflow, WorkflowHost, WorkflowObserver};

/// Observer that records node lifecycle and render passes into a session.
pub struct WorkflowRecorder {
    session: Arc<SharedRecordingSession>,
}

impl WorkflowRecorder {
    pub fn new(session: Arc<SharedRecordingSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SharedRecordingSession> {
        &self.session
    }
}

impl WorkflowObserver for WorkflowRecorder {
    fn on_node_started(&self, node: &NodeInfo) {
        self.session
            .record_event(RecordedEvent::NodeStarted(NodeEvent::from(node)));
    }

    fn on_node_finished(&self, node: &NodeInfo) {
        self.session
            .record_event(RecordedEvent::NodeFinished(NodeEvent::from(node)));
    }

    fn on_render_started(&self, node: &NodeInfo, is_root_node: bool) {
        self.session.record_event(RecordedEvent::RenderStarted(RenderEvent {
            node: NodeEvent::from(node),
            is_root: is_root_node,
        }));
    }

    fn on_render_finished(&self, node: &NodeInfo, is_root_node: bool) {
        self.session.record_event(RecordedEvent::RenderFinished(RenderEvent {
            node: NodeEvent::from(node),
            is_root: is_root_node,
        }));
    }
}

/// Install `session` as the host's debugger.
///
/// Every committed render is recorded as a snapshot together with the update
/// that caused it. The host must have `debug_snapshots` enabled.
pub fn attach<W: Workflow>(host: &mut WorkflowHost<W>, session: Arc<SharedRecordingSession>) {
    if !host.config().debug_snapshots {
        tracing::warn!(
            host = %host.config().name,
            "recorder attached to a host without debug snapshots; no snapshots will be recorded"
        );
    }
    host.set_debugger(move |snapshot, update| {
        if let Some(diff) = session.record_snapshot(snapshot.clone(), update.cloned()) {
            tracing::trace!(changes = diff.change_count(), "recorded snapshot");
        }
    });
}
