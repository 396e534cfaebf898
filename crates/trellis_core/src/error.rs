//! Error types for trellis_core
//!
//! Workflow functions themselves are total and never fail. The only fallible
//! path is routing a queued event from a sink back down to the node that owns
//! it, which can go wrong when the tree was reshaped in an unexpected way
//! between the send and the reduction.

use thiserror::Error;

/// Errors that can occur while routing queued events through a workflow tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// A path segment names a child that is not part of the current tree
    #[error("no child workflow {workflow_type} with key {key:?} under this node")]
    UnknownChild {
        workflow_type: &'static str,
        key: String,
    },

    /// The queued payload is not an action for the workflow it was routed to
    #[error("queued action does not target workflow {expected}")]
    ActionTypeMismatch { expected: &'static str },
}

/// Result type for trellis_core operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
