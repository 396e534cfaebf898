//! State transitions
//!
//! An action is a value that knows how to transform the state of one specific
//! workflow and may yield an output for that workflow's owner. Actions are the
//! only way state changes: they are applied by the owning node during its
//! reduction step, never during render.

use std::fmt;

use crate::workflow::Workflow;

/// A state transition for `Self::Workflow`.
pub trait WorkflowAction: 'static {
    type Workflow: Workflow;

    /// Apply this transition to `state`, optionally producing an output.
    fn apply(
        self,
        state: &mut <Self::Workflow as Workflow>::State,
    ) -> Option<<Self::Workflow as Workflow>::Output>;
}

type ApplyFn<W> =
    Box<dyn FnOnce(&mut <W as Workflow>::State) -> Option<<W as Workflow>::Output>>;

/// Type-erased action for workflow `W`.
///
/// Lets sinks and child output mappings of different concrete action types
/// travel through the same notification channel.
pub struct AnyWorkflowAction<W: Workflow> {
    apply: ApplyFn<W>,
    action_type: &'static str,
}

impl<W: Workflow> AnyWorkflowAction<W> {
    /// Erase a concrete action
    pub fn new<A>(action: A) -> Self
    where
        A: WorkflowAction<Workflow = W>,
    {
        Self {
            apply: Box::new(move |state| action.apply(state)),
            action_type: std::any::type_name::<A>(),
        }
    }

    /// Build an action from a closure over the state
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(&mut W::State) -> Option<W::Output> + 'static,
    {
        Self {
            apply: Box::new(f),
            action_type: "closure",
        }
    }

    /// An action that neither changes state nor produces output
    pub fn noop() -> Self {
        Self {
            apply: Box::new(|_| None),
            action_type: "noop",
        }
    }

    /// Type name of the erased action, for diagnostics
    pub fn action_type(&self) -> &'static str {
        self.action_type
    }
}

impl<W: Workflow> WorkflowAction for AnyWorkflowAction<W> {
    type Workflow = W;

    fn apply(self, state: &mut W::State) -> Option<W::Output> {
        (self.apply)(state)
    }
}

impl<W: Workflow> fmt::Debug for AnyWorkflowAction<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyWorkflowAction")
            .field("workflow", &W::workflow_type())
            .field("action", &self.action_type)
            .finish()
    }
}
