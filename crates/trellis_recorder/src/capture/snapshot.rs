//! Hierarchy snapshots captured per render and the differences between them.

use super::primitives::Timestamp;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use trellis_core::{WorkflowHierarchyDebugSnapshot, WorkflowUpdateDebugInfo};

/// A hierarchy snapshot with the update that caused the render, if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampedSnapshot {
    pub timestamp: Timestamp,
    pub snapshot: WorkflowHierarchyDebugSnapshot,
    /// `None` for renders not caused by an event, such as the initial one.
    pub update: Option<WorkflowUpdateDebugInfo>,
}

impl TimestampedSnapshot {
    pub fn new(
        timestamp: Timestamp,
        snapshot: WorkflowHierarchyDebugSnapshot,
        update: Option<WorkflowUpdateDebugInfo>,
    ) -> Self {
        Self {
            timestamp,
            snapshot,
            update,
        }
    }
}

/// Difference between two hierarchy snapshots.
///
/// Nodes are addressed by the identities of the children on the way down
/// (`Type[key]`), joined with `/`; the root is the empty string. A key reused
/// by a different workflow type is a different child, so it shows up as one
/// removal and one addition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Nodes whose state description changed
    pub changed: Vec<StateChange>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub path: String,
    pub old: String,
    pub new: String,
}

fn flatten<'a>(
    snapshot: &'a WorkflowHierarchyDebugSnapshot,
    path: String,
    nodes: &mut IndexMap<String, &'a str>,
) {
    nodes.insert(path.clone(), &snapshot.state_description);
    for child in &snapshot.children {
        let identity = child.identity();
        let child_path = if path.is_empty() {
            identity
        } else {
            format!("{path}/{identity}")
        };
        flatten(&child.snapshot, child_path, nodes);
    }
}

/// Compute the difference between two snapshots of the same tree.
pub fn diff_snapshots(
    old: &WorkflowHierarchyDebugSnapshot,
    new: &WorkflowHierarchyDebugSnapshot,
) -> SnapshotDiff {
    let mut old_nodes = IndexMap::new();
    let mut new_nodes = IndexMap::new();
    flatten(old, String::new(), &mut old_nodes);
    flatten(new, String::new(), &mut new_nodes);

    let mut diff = SnapshotDiff::default();

    for (path, state) in &new_nodes {
        match old_nodes.get(path) {
            None => diff.added.push(path.clone()),
            Some(previous) if previous != state => diff.changed.push(StateChange {
                path: path.clone(),
                old: previous.to_string(),
                new: state.to_string(),
            }),
            Some(_) => {}
        }
    }

    for path in old_nodes.keys() {
        if !new_nodes.contains_key(path) {
            diff.removed.push(path.clone());
        }
    }

    diff
}
