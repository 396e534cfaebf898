//! Workflow definitions
//!
//! A workflow is an immutable description of one node in the tree: how to
//! build its initial state, how to render that state into a `Rendering`, and
//! how to adapt the state when the owner replaces the definition with a new
//! one.
//!
//! ```ignore
//! use trellis_core::{RenderContext, Workflow};
//!
//! #[derive(Debug)]
//! struct Counter {
//!     start: i32,
//! }
//!
//! impl Workflow for Counter {
//!     type State = i32;
//!     type Rendering = String;
//!     type Output = ();
//!
//!     fn make_initial_state(&self) -> i32 {
//!         self.start
//!     }
//!
//!     fn render(&self, state: &i32, _context: &mut RenderContext<'_, Self>) -> String {
//!         format!("count: {state}")
//!     }
//! }
//! ```

use std::fmt::Debug;

use crate::subtree::RenderContext;

/// The capability set every node definition provides.
///
/// `State` must be `Debug` so debug snapshots can carry a human-readable
/// rendering of it.
pub trait Workflow: Sized + 'static {
    /// State owned by the node running this workflow
    type State: Debug + 'static;
    /// Value produced by each render pass
    type Rendering: 'static;
    /// Externally visible events reported to the owner
    type Output: 'static;

    /// Build the state a freshly created node starts with.
    fn make_initial_state(&self) -> Self::State;

    /// Called on the incoming definition when the owner replaces `previous`
    /// with `self`, before `self` is used to render.
    fn workflow_did_change(&self, previous: &Self, state: &mut Self::State) {
        let _ = (previous, state);
    }

    /// Render `state`. Children and sinks may only be declared through
    /// `context`; state is read-only here.
    fn render(&self, state: &Self::State, context: &mut RenderContext<'_, Self>)
        -> Self::Rendering;

    /// Identity tag used in diagnostics.
    fn workflow_type() -> &'static str {
        std::any::type_name::<Self>()
    }
}
