//! Lifecycle and render-pass observers
//!
//! Observers are passive: they are told when nodes start and finish and when
//! render passes begin and end, and they must not influence control flow.

use std::fmt;
use std::rc::Rc;

use crate::subtree::ChildKey;

/// Stable identifier of a node within one tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(raw: u64) -> Self {
        NodeId(raw)
    }

    /// Raw value, for logging and export
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an observer is told about a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub workflow_type: &'static str,
    /// Child keys from the root down to this node (empty for the root)
    pub path: Rc<[ChildKey]>,
}

impl NodeInfo {
    /// Distance from the root
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The caller-supplied key this node was declared with, if it is a child
    pub fn key(&self) -> Option<&str> {
        self.path.last().map(ChildKey::key)
    }
}

/// Passive observer of node lifecycle and render-pass boundaries.
///
/// All methods default to no-ops.
pub trait WorkflowObserver {
    fn on_node_started(&self, node: &NodeInfo) {
        let _ = node;
    }

    fn on_node_finished(&self, node: &NodeInfo) {
        let _ = node;
    }

    fn on_render_started(&self, node: &NodeInfo, is_root_node: bool) {
        let _ = (node, is_root_node);
    }

    fn on_render_finished(&self, node: &NodeInfo, is_root_node: bool) {
        let _ = (node, is_root_node);
    }
}

/// Logs every callback through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl WorkflowObserver for TracingObserver {
    fn on_node_started(&self, node: &NodeInfo) {
        tracing::debug!(
            node = node.id.get(),
            workflow = node.workflow_type,
            depth = node.depth(),
            key = node.key().unwrap_or(""),
            "workflow node started"
        );
    }

    fn on_node_finished(&self, node: &NodeInfo) {
        tracing::debug!(
            node = node.id.get(),
            workflow = node.workflow_type,
            "workflow node finished"
        );
    }

    fn on_render_started(&self, node: &NodeInfo, is_root_node: bool) {
        tracing::trace!(node = node.id.get(), is_root_node, "render pass started");
    }

    fn on_render_finished(&self, node: &NodeInfo, is_root_node: bool) {
        tracing::trace!(node = node.id.get(), is_root_node, "render pass finished");
    }
}

/// Fans each callback out to several observers, in registration order.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Rc<dyn WorkflowObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Rc<dyn WorkflowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Rc<dyn WorkflowObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl WorkflowObserver for ObserverSet {
    fn on_node_started(&self, node: &NodeInfo) {
        for observer in &self.observers {
            observer.on_node_started(node);
        }
    }

    fn on_node_finished(&self, node: &NodeInfo) {
        for observer in &self.observers {
            observer.on_node_finished(node);
        }
    }

    fn on_render_started(&self, node: &NodeInfo, is_root_node: bool) {
        for observer in &self.observers {
            observer.on_render_started(node, is_root_node);
        }
    }

    fn on_render_finished(&self, node: &NodeInfo, is_root_node: bool) {
        for observer in &self.observers {
            observer.on_render_finished(node, is_root_node);
        }
    }
}

/// Emits `on_render_finished` when dropped, so the finished event is reported
/// on every exit path of a render pass, including unwinding.
pub(crate) struct RenderPassGuard {
    observer: Option<Rc<dyn WorkflowObserver>>,
    node: NodeInfo,
    is_root_node: bool,
}

impl RenderPassGuard {
    pub(crate) fn begin(
        observer: Option<Rc<dyn WorkflowObserver>>,
        node: NodeInfo,
        is_root_node: bool,
    ) -> Self {
        if let Some(observer) = &observer {
            observer.on_render_started(&node, is_root_node);
        }
        Self {
            observer,
            node,
            is_root_node,
        }
    }
}

impl Drop for RenderPassGuard {
    fn drop(&mut self) {
        if let Some(observer) = &self.observer {
            observer.on_render_finished(&self.node, self.is_root_node);
        }
    }
}
