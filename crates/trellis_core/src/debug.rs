//! Diagnostic metadata for workflow trees.
//!
//! Two kinds of data flow through the diagnostics path:
//!
//! - [`WorkflowUpdateDebugInfo`] travels up the tree with every output. It
//!   records which node actually changed and the chain of ancestors the
//!   notification passed through, without ancestors knowing anything about
//!   the action types below them.
//! - [`WorkflowHierarchyDebugSnapshot`] is a read-only picture of a node and
//!   its current children, taken between mutations.

use serde::{Deserialize, Serialize};

/// Where a direct update came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateSource {
    /// A sink owned by the updated node fired
    External,
    /// A child produced an output that was mapped into an action on this node
    Subtree(Box<WorkflowUpdateDebugInfo>),
}

/// How a node was involved in an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// The node applied an action to its own state
    DidUpdate { source: UpdateSource },
    /// A descendant changed; this node only passed the notification along
    ChildDidUpdate(Box<WorkflowUpdateDebugInfo>),
}

/// Diagnostic metadata attached to every output a node emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowUpdateDebugInfo {
    /// Identity tag of the workflow that emitted this info
    pub workflow_type: String,
    pub kind: UpdateKind,
}

impl WorkflowUpdateDebugInfo {
    /// Info for a node that applied an action itself
    pub fn did_update(workflow_type: impl Into<String>, source: UpdateSource) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            kind: UpdateKind::DidUpdate { source },
        }
    }

    /// Wrap a child's info one level deeper
    pub fn child_did_update(
        workflow_type: impl Into<String>,
        child: WorkflowUpdateDebugInfo,
    ) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            kind: UpdateKind::ChildDidUpdate(Box::new(child)),
        }
    }

    /// Whether this node applied an action itself
    pub fn is_direct(&self) -> bool {
        matches!(self.kind, UpdateKind::DidUpdate { .. })
    }

    /// The nested info of the child this notification passed through, if any
    pub fn child(&self) -> Option<&WorkflowUpdateDebugInfo> {
        match &self.kind {
            UpdateKind::ChildDidUpdate(child) => Some(child),
            UpdateKind::DidUpdate { .. } => None,
        }
    }

    /// Follow pass-through links down to the node that changed its state
    pub fn originating(&self) -> &WorkflowUpdateDebugInfo {
        let mut current = self;
        while let Some(child) = current.child() {
            current = child;
        }
        current
    }

    /// Workflow types from this node down to the node that changed state
    pub fn path(&self) -> Vec<&str> {
        let mut path = vec![self.workflow_type.as_str()];
        let mut current = self;
        while let Some(child) = current.child() {
            path.push(child.workflow_type.as_str());
            current = child;
        }
        path
    }

    /// Number of pass-through levels above the node that changed state
    pub fn depth(&self) -> usize {
        self.path().len() - 1
    }

    /// Serialize to JSON for external tooling
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One child entry in a snapshot.
///
/// A child is identified by its workflow type together with the
/// caller-supplied key; siblings of different types may share a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSnapshot {
    pub key: String,
    pub snapshot: WorkflowHierarchyDebugSnapshot,
}

impl ChildSnapshot {
    /// Identity of this child among its siblings, formatted as `Type[key]`
    /// (or `Type` for an empty key)
    pub fn identity(&self) -> String {
        if self.key.is_empty() {
            self.snapshot.workflow_type.clone()
        } else {
            format!("{}[{}]", self.snapshot.workflow_type, self.key)
        }
    }
}

/// Point-in-time description of a node and all of its descendants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowHierarchyDebugSnapshot {
    /// Identity tag of the workflow definition
    pub workflow_type: String,
    /// Human-readable rendering of the node's state
    pub state_description: String,
    /// Children established by the most recent render, in declaration order
    pub children: Vec<ChildSnapshot>,
}

impl WorkflowHierarchyDebugSnapshot {
    pub fn new(workflow_type: impl Into<String>, state_description: impl Into<String>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            state_description: state_description.into(),
            children: Vec::new(),
        }
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Keys of direct children, in declaration order
    pub fn child_keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.key.as_str())
    }

    /// Look up a direct child by key. When siblings of different types share
    /// the key, the first declared one is returned; use
    /// [`child_of_type`](Self::child_of_type) to pick a specific one.
    pub fn child(&self, key: &str) -> Option<&WorkflowHierarchyDebugSnapshot> {
        self.children
            .iter()
            .find(|c| c.key == key)
            .map(|c| &c.snapshot)
    }

    /// Look up a direct child by its full identity
    pub fn child_of_type(
        &self,
        workflow_type: &str,
        key: &str,
    ) -> Option<&WorkflowHierarchyDebugSnapshot> {
        self.children
            .iter()
            .find(|c| c.key == key && c.snapshot.workflow_type == workflow_type)
            .map(|c| &c.snapshot)
    }

    /// Look up a descendant by a path of keys, taking the first match at
    /// each level
    pub fn find(&self, path: &[&str]) -> Option<&WorkflowHierarchyDebugSnapshot> {
        path.iter()
            .try_fold(self, |snapshot, key| snapshot.child(key))
    }

    /// Total number of nodes in this subtree, including this one
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| c.snapshot.node_count())
            .sum::<usize>()
    }

    /// Serialize to JSON for external tooling
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
