//! Event types for recording workflow activity.

use super::primitives::Timestamp;
use serde::{Deserialize, Serialize};
use trellis_core::{NodeInfo, WorkflowUpdateDebugInfo};

/// A recorded event with timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEvent {
    /// When the event occurred (relative to session start).
    pub timestamp: Timestamp,
    pub event: RecordedEvent,
}

impl TimestampedEvent {
    pub fn new(timestamp: Timestamp, event: RecordedEvent) -> Self {
        Self { timestamp, event }
    }
}

/// All recordable event types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecordedEvent {
    // Node lifecycle
    NodeStarted(NodeEvent),
    NodeFinished(NodeEvent),

    // Render passes
    RenderStarted(RenderEvent),
    RenderFinished(RenderEvent),

    // A committed update, as reported to the host
    Update(WorkflowUpdateDebugInfo),

    // Custom/application events
    Custom(CustomEvent),
}

impl RecordedEvent {
    /// Short name of the event kind, used for filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            RecordedEvent::NodeStarted(_) => "node_started",
            RecordedEvent::NodeFinished(_) => "node_finished",
            RecordedEvent::RenderStarted(_) => "render_started",
            RecordedEvent::RenderFinished(_) => "render_finished",
            RecordedEvent::Update(_) => "update",
            RecordedEvent::Custom(_) => "custom",
        }
    }

    /// The node this event is about, if it is about a single node.
    pub fn node(&self) -> Option<&NodeEvent> {
        match self {
            RecordedEvent::NodeStarted(node) | RecordedEvent::NodeFinished(node) => Some(node),
            RecordedEvent::RenderStarted(render) | RecordedEvent::RenderFinished(render) => {
                Some(&render.node)
            }
            RecordedEvent::Update(_) | RecordedEvent::Custom(_) => None,
        }
    }
}

/// Identity of a node at the time of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub node_id: u64,
    pub workflow_type: String,
    /// Child keys from the root down to this node; empty for the root.
    pub path: Vec<String>,
}

impl From<&NodeInfo> for NodeEvent {
    fn from(info: &NodeInfo) -> Self {
        Self {
            node_id: info.id.get(),
            workflow_type: info.workflow_type.to_string(),
            path: info.path.iter().map(|key| key.key().to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEvent {
    pub node: NodeEvent,
    pub is_root: bool,
}

/// Application-defined event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    pub name: String,
    pub data: serde_json::Value,
}

impl CustomEvent {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}
