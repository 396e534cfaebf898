//! Event sinks and the serial event queue
//!
//! A [`Sink`] is handed out during render and may be stored in the rendering.
//! Sending on it never touches state directly: the value is converted into an
//! action for the node that created the sink and pushed onto the tree's
//! [`EventQueue`]. The owning host drains that queue from its single execution
//! context, which is what keeps every state mutation on one writer.
//!
//! Each node owns one [`EventPipe`] that gates its sinks:
//!
//! - `Pending` from the start of a render pass until `enable_events`
//! - `Enabled` afterwards
//! - `Invalidated` once the node is discarded
//!
//! Sending while pending means an event fired before the render that created
//! the sink was committed, which is a logic bug and panics. Sending on an
//! invalidated pipe is silently dropped.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::subtree::ChildKey;

/// Gate state of a node's event pipe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeState {
    Pending,
    Enabled,
    Invalidated,
}

/// Shared gate between a node and all sinks it has created
#[derive(Clone)]
pub(crate) struct EventPipe {
    state: Rc<Cell<PipeState>>,
}

impl EventPipe {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(PipeState::Pending)),
        }
    }

    pub(crate) fn state(&self) -> PipeState {
        self.state.get()
    }

    pub(crate) fn set_pending(&self) {
        if self.state.get() != PipeState::Invalidated {
            self.state.set(PipeState::Pending);
        }
    }

    pub(crate) fn enable(&self) {
        if self.state.get() != PipeState::Invalidated {
            self.state.set(PipeState::Enabled);
        }
    }

    pub(crate) fn invalidate(&self) {
        self.state.set(PipeState::Invalidated);
    }
}

/// An event waiting on the serial queue
pub(crate) struct QueuedEvent {
    /// Path from the root to the node that created the sink
    pub(crate) path: Rc<[ChildKey]>,
    pub(crate) pipe: EventPipe,
    /// An `AnyWorkflowAction` for the target workflow
    pub(crate) payload: Box<dyn Any>,
    pub(crate) workflow_type: &'static str,
}

impl QueuedEvent {
    /// The node that created the sink has been discarded since the send
    pub(crate) fn is_stale(&self) -> bool {
        self.pipe.state() == PipeState::Invalidated
    }
}

/// FIFO of sent events shared by every sink in one tree.
#[derive(Clone, Default)]
pub struct EventQueue {
    events: Rc<RefCell<VecDeque<QueuedEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events waiting to be processed
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub(crate) fn push(&self, event: QueuedEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub(crate) fn pop(&self) -> Option<QueuedEvent> {
        self.events.borrow_mut().pop_front()
    }

    /// Drop every queued event
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue").field("len", &self.len()).finish()
    }
}

/// Where a sink delivers: the creating node's path, pipe and tree queue
#[derive(Clone)]
pub(crate) struct SinkRoute {
    pub(crate) path: Rc<[ChildKey]>,
    pub(crate) pipe: EventPipe,
    pub(crate) queue: EventQueue,
    pub(crate) workflow_type: &'static str,
}

type EraseFn<V> = Rc<dyn Fn(V) -> Box<dyn Any>>;

/// Handle that turns values of type `V` into actions on the node that
/// created it.
pub struct Sink<V> {
    route: SinkRoute,
    erase: EraseFn<V>,
}

impl<V: 'static> Sink<V> {
    pub(crate) fn new(route: SinkRoute, erase: EraseFn<V>) -> Self {
        Self { route, erase }
    }

    /// Send a value. See the module docs for the gating rules.
    pub fn send(&self, value: V) {
        match self.route.pipe.state() {
            PipeState::Enabled => {
                let payload = (self.erase)(value);
                self.route.queue.push(QueuedEvent {
                    path: Rc::clone(&self.route.path),
                    pipe: self.route.pipe.clone(),
                    payload,
                    workflow_type: self.route.workflow_type,
                });
            }
            PipeState::Pending => panic!(
                "sink for {} sent an event before its render pass was committed and events were enabled",
                self.route.workflow_type
            ),
            PipeState::Invalidated => {
                tracing::debug!(
                    workflow = self.route.workflow_type,
                    "dropping event sent to a discarded workflow node"
                );
            }
        }
    }

    /// A sink accepting `U` that converts into `V` before sending here
    pub fn contramap<U, F>(&self, f: F) -> Sink<U>
    where
        U: 'static,
        F: Fn(U) -> V + 'static,
    {
        let erase = Rc::clone(&self.erase);
        Sink {
            route: self.route.clone(),
            erase: Rc::new(move |value| erase(f(value))),
        }
    }

    /// Current gate state of the creating node
    pub fn state(&self) -> PipeState {
        self.route.pipe.state()
    }
}

impl<V> Clone for Sink<V> {
    fn clone(&self) -> Self {
        Self {
            route: self.route.clone(),
            erase: Rc::clone(&self.erase),
        }
    }
}

impl<V> fmt::Debug for Sink<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("workflow", &self.route.workflow_type)
            .field("depth", &self.route.path.len())
            .field("state", &self.route.pipe.state())
            .finish()
    }
}
