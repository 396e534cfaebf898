//! Trellis Core Runtime
//!
//! Execution core for unidirectional, tree-structured state machines:
//!
//! - **Workflows**: definitions that build initial state, render it, and
//!   migrate it when replaced
//! - **Actions**: the only way state changes, applied during reduction
//! - **Nodes**: own one state, render through a subtree manager, and report
//!   one output per reduced notification
//! - **Sinks**: render-gated handles that queue actions for later reduction
//! - **Host**: the single execution context that drives a whole tree
//! - **Diagnostics**: update info chains, hierarchy snapshots, observers
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{RenderContext, Sink, Workflow, WorkflowAction, WorkflowHost};
//!
//! struct Counter;
//!
//! struct Increment;
//!
//! impl WorkflowAction for Increment {
//!     type Workflow = Counter;
//!
//!     fn apply(self, state: &mut i32) -> Option<()> {
//!         *state += 1;
//!         None
//!     }
//! }
//!
//! struct Screen {
//!     count: i32,
//!     increment: Sink<Increment>,
//! }
//!
//! impl Workflow for Counter {
//!     type State = i32;
//!     type Rendering = Screen;
//!     type Output = ();
//!
//!     fn make_initial_state(&self) -> i32 {
//!         0
//!     }
//!
//!     fn render(&self, state: &i32, context: &mut RenderContext<'_, Self>) -> Screen {
//!         Screen {
//!             count: *state,
//!             increment: context.make_sink(),
//!         }
//!     }
//! }
//!
//! let mut host = WorkflowHost::new(Counter);
//! host.rendering().increment.send(Increment);
//! host.process_events().unwrap();
//! assert_eq!(host.rendering().count, 1);
//! ```

pub mod action;
pub mod config;
pub mod debug;
pub mod error;
pub mod host;
pub mod node;
pub mod observer;
pub mod sink;
pub mod subtree;
pub mod workflow;

pub use action::{AnyWorkflowAction, WorkflowAction};
pub use config::HostConfig;
pub use debug::{
    ChildSnapshot, UpdateKind, UpdateSource, WorkflowHierarchyDebugSnapshot,
    WorkflowUpdateDebugInfo,
};
pub use error::{Result, WorkflowError};
pub use host::WorkflowHost;
pub use node::{TreeContext, WorkflowNode, WorkflowOutput};
pub use observer::{NodeId, NodeInfo, ObserverSet, TracingObserver, WorkflowObserver};
pub use sink::{EventQueue, PipeState, Sink};
pub use subtree::{ChildKey, RenderContext, SubtreeManager, SubtreeOutput};
pub use workflow::Workflow;
