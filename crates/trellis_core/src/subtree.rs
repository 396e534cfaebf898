//! Subtree management
//!
//! Every node owns a [`SubtreeManager`] that holds its children between
//! render passes, hands out the [`RenderContext`] used to declare children and
//! sinks, and turns whatever happens below the node into a single
//! notification shape, [`SubtreeOutput`].
//!
//! # Reconciliation
//!
//! Children are identified by the workflow type plus a caller-supplied key.
//! During a render pass each declared child is either taken over from the
//! previous pass (and `update`d with the new definition) or created. Children
//! of the previous pass that were not declared again are dropped when the
//! pass ends. A snapshot taken after the pass lists exactly the declared
//! children, in declaration order.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::{smallvec, SmallVec};

use crate::action::{AnyWorkflowAction, WorkflowAction};
use crate::debug::{
    ChildSnapshot, UpdateSource, WorkflowHierarchyDebugSnapshot, WorkflowUpdateDebugInfo,
};
use crate::error::{Result, WorkflowError};
use crate::node::{TreeContext, WorkflowNode, WorkflowOutput};
use crate::sink::{EventPipe, Sink, SinkRoute};
use crate::workflow::Workflow;

/// Identity of a child: workflow type plus caller-supplied key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChildKey {
    type_id: TypeId,
    workflow_type: &'static str,
    key: String,
}

impl ChildKey {
    pub fn new<C: Workflow>(key: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            workflow_type: C::workflow_type(),
            key: key.into(),
        }
    }

    pub fn workflow_type(&self) -> &'static str {
        self.workflow_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.workflow_type)
        } else {
            write!(f, "{}[{}]", self.workflow_type, self.key)
        }
    }
}

/// The two notification shapes a node reduces.
pub enum SubtreeOutput<W: Workflow> {
    /// An action to apply to this node's state
    Update {
        action: AnyWorkflowAction<W>,
        source: UpdateSource,
    },
    /// A descendant changed; nothing to apply here
    ChildDidUpdate(WorkflowUpdateDebugInfo),
}

impl<W: Workflow> fmt::Debug for SubtreeOutput<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtreeOutput::Update { action, source } => f
                .debug_struct("Update")
                .field("action", action)
                .field("source", source)
                .finish(),
            SubtreeOutput::ChildDidUpdate(info) => {
                f.debug_tuple("ChildDidUpdate").field(info).finish()
            }
        }
    }
}

/// Notifications produced by one routed event; almost always exactly one
pub(crate) type Notifications<W> = SmallVec<[SubtreeOutput<W>; 1]>;

type ChildMap<P> = IndexMap<ChildKey, Box<dyn AnyChildWorkflow<P>>, FxBuildHasher>;

/// Type-erased child record owned by a parent of workflow type `P`
trait AnyChildWorkflow<P: Workflow> {
    fn route(&mut self, path: &[ChildKey], payload: Box<dyn Any>)
        -> Result<Notifications<P>>;
    fn enable_events(&mut self);
    fn make_debug_snapshot(&self) -> WorkflowHierarchyDebugSnapshot;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

type OutputMap<P, C> = Box<dyn Fn(<C as Workflow>::Output) -> AnyWorkflowAction<P>>;
type Mailbox<C> = Rc<RefCell<VecDeque<WorkflowOutput<C>>>>;

/// A child node plus the mapping of its outputs into parent actions.
///
/// The child's listener only pushes into `mailbox`; the parent drains it
/// after routing.
struct ChildWorkflow<P: Workflow, C: Workflow> {
    node: WorkflowNode<C>,
    output_map: OutputMap<P, C>,
    mailbox: Mailbox<C>,
}

impl<P: Workflow, C: Workflow> ChildWorkflow<P, C> {
    fn new(
        workflow: C,
        tree: &TreeContext,
        path: Rc<[ChildKey]>,
        output_map: OutputMap<P, C>,
    ) -> Self {
        let mut node = WorkflowNode::with_path(workflow, tree, path);
        let mailbox: Mailbox<C> = Rc::default();
        let sender: Weak<RefCell<VecDeque<WorkflowOutput<C>>>> = Rc::downgrade(&mailbox);
        node.set_listener(move |output| {
            if let Some(mailbox) = sender.upgrade() {
                mailbox.borrow_mut().push_back(output);
            }
        });
        Self {
            node,
            output_map,
            mailbox,
        }
    }

    fn update(&mut self, workflow: C, output_map: OutputMap<P, C>) {
        self.node.update(workflow);
        self.output_map = output_map;
    }

    fn render(&mut self) -> C::Rendering {
        self.node.render(false)
    }

    fn drain_outputs(&mut self) -> Notifications<P> {
        let outputs: Vec<WorkflowOutput<C>> = self.mailbox.borrow_mut().drain(..).collect();
        outputs
            .into_iter()
            .map(|output| match output.output_event {
                Some(event) => SubtreeOutput::Update {
                    action: (self.output_map)(event),
                    source: UpdateSource::Subtree(Box::new(output.debug_info)),
                },
                None => SubtreeOutput::ChildDidUpdate(output.debug_info),
            })
            .collect()
    }
}

impl<P: Workflow, C: Workflow> AnyChildWorkflow<P> for ChildWorkflow<P, C> {
    fn route(&mut self, path: &[ChildKey], payload: Box<dyn Any>) -> Result<Notifications<P>> {
        self.node.deliver(path, payload)?;
        Ok(self.drain_outputs())
    }

    fn enable_events(&mut self) {
        self.node.enable_events();
    }

    fn make_debug_snapshot(&self) -> WorkflowHierarchyDebugSnapshot {
        self.node.make_debug_snapshot()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns a node's children and sinks across render passes.
pub struct SubtreeManager<W: Workflow> {
    children: ChildMap<W>,
    pipe: EventPipe,
    tree: TreeContext,
    path: Rc<[ChildKey]>,
    has_rendered: bool,
}

impl<W: Workflow> SubtreeManager<W> {
    pub(crate) fn new(tree: TreeContext, path: Rc<[ChildKey]>) -> Self {
        Self {
            children: IndexMap::default(),
            pipe: EventPipe::new(),
            tree,
            path,
            has_rendered: false,
        }
    }

    /// Run one render pass. Sinks are gated until `enable_events`; children
    /// not declared by `render` are dropped once it returns.
    pub(crate) fn render<R>(
        &mut self,
        render: impl FnOnce(&mut RenderContext<'_, W>) -> R,
    ) -> R {
        self.pipe.set_pending();

        let mut context = RenderContext {
            previous: std::mem::take(&mut self.children),
            used: IndexMap::default(),
            pipe: &self.pipe,
            tree: &self.tree,
            path: &self.path,
        };
        let rendering = render(&mut context);

        let RenderContext { previous, used, .. } = context;
        self.children = used;
        self.has_rendered = true;

        if !previous.is_empty() {
            tracing::trace!(
                workflow = W::workflow_type(),
                removed = previous.len(),
                "tearing down undeclared children"
            );
        }
        drop(previous);

        rendering
    }

    /// Enable this node's sinks and, recursively, those of every child.
    /// Without a completed render pass there is nothing to enable.
    pub fn enable_events(&mut self) {
        if !self.has_rendered {
            tracing::trace!(
                workflow = W::workflow_type(),
                "enable_events before first render, nothing to enable"
            );
            return;
        }
        self.pipe.enable();
        for child in self.children.values_mut() {
            child.enable_events();
        }
    }

    /// Route a queued payload to this node (empty path) or down to a child.
    pub(crate) fn route(
        &mut self,
        path: &[ChildKey],
        payload: Box<dyn Any>,
    ) -> Result<Notifications<W>> {
        match path.split_first() {
            None => {
                let action = payload
                    .downcast::<AnyWorkflowAction<W>>()
                    .map_err(|_| WorkflowError::ActionTypeMismatch {
                        expected: W::workflow_type(),
                    })?;
                Ok(smallvec![SubtreeOutput::Update {
                    action: *action,
                    source: UpdateSource::External,
                }])
            }
            Some((head, rest)) => {
                let child = self
                    .children
                    .get_mut(head)
                    .ok_or_else(|| WorkflowError::UnknownChild {
                        workflow_type: head.workflow_type(),
                        key: head.key().to_string(),
                    })?;
                child.route(rest, payload)
            }
        }
    }

    /// Snapshots of the current children, in declaration order
    pub fn child_snapshots(&self) -> Vec<ChildSnapshot> {
        self.children
            .iter()
            .map(|(key, child)| ChildSnapshot {
                key: key.key().to_string(),
                snapshot: child.make_debug_snapshot(),
            })
            .collect()
    }

    /// Number of children established by the last render pass
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Identities of the current children, in declaration order
    pub fn child_keys(&self) -> impl Iterator<Item = &ChildKey> {
        self.children.keys()
    }

    pub(crate) fn invalidate(&self) {
        self.pipe.invalidate();
    }
}

/// Render-scoped handle for declaring children and creating sinks.
pub struct RenderContext<'a, W: Workflow> {
    previous: ChildMap<W>,
    used: ChildMap<W>,
    pipe: &'a EventPipe,
    tree: &'a TreeContext,
    path: &'a Rc<[ChildKey]>,
}

impl<'a, W: Workflow> RenderContext<'a, W> {
    /// Declare a child and render it. Outputs of the child are turned into
    /// actions on this workflow by `output_map`.
    ///
    /// # Panics
    ///
    /// Declaring the same workflow type with the same key twice in one render
    /// pass panics.
    pub fn render_child<C, F>(
        &mut self,
        workflow: C,
        key: impl Into<String>,
        output_map: F,
    ) -> C::Rendering
    where
        C: Workflow,
        F: Fn(C::Output) -> AnyWorkflowAction<W> + 'static,
    {
        let child_key = ChildKey::new::<C>(key);
        if self.used.contains_key(&child_key) {
            panic!(
                "child workflows of the same type must have unique keys: {child_key} declared twice"
            );
        }
        let output_map: OutputMap<W, C> = Box::new(output_map);

        let mut child = match self.previous.swap_remove(&child_key) {
            Some(existing) => existing,
            None => {
                let path: Rc<[ChildKey]> = self
                    .path
                    .iter()
                    .cloned()
                    .chain(std::iter::once(child_key.clone()))
                    .collect();
                let created = ChildWorkflow::<W, C>::new(workflow, self.tree, path, output_map);
                return self.render_declared::<C>(child_key, Box::new(created));
            }
        };

        match child.as_any_mut().downcast_mut::<ChildWorkflow<W, C>>() {
            Some(existing) => existing.update(workflow, output_map),
            None => unreachable!("child key {child_key} matched a child of another workflow type"),
        }
        self.render_declared::<C>(child_key, child)
    }

    /// Declare a child whose output events are ignored. Structural updates
    /// from it still propagate.
    pub fn render_child_without_output<C>(
        &mut self,
        workflow: C,
        key: impl Into<String>,
    ) -> C::Rendering
    where
        C: Workflow,
    {
        self.render_child(workflow, key, |_| AnyWorkflowAction::noop())
    }

    fn render_declared<C: Workflow>(
        &mut self,
        child_key: ChildKey,
        mut child: Box<dyn AnyChildWorkflow<W>>,
    ) -> C::Rendering {
        let rendering = match child.as_any_mut().downcast_mut::<ChildWorkflow<W, C>>() {
            Some(child) => child.render(),
            None => unreachable!("child key {child_key} matched a child of another workflow type"),
        };
        self.used.insert(child_key, child);
        rendering
    }

    /// A sink that enqueues actions of type `A` for this node.
    pub fn make_sink<A>(&self) -> Sink<A>
    where
        A: WorkflowAction<Workflow = W>,
    {
        self.make_sink_with(|action: A| action)
    }

    /// A sink that maps each sent value into an action for this node.
    pub fn make_sink_with<V, A, F>(&self, map: F) -> Sink<V>
    where
        V: 'static,
        A: WorkflowAction<Workflow = W>,
        F: Fn(V) -> A + 'static,
    {
        let route = SinkRoute {
            path: Rc::clone(self.path),
            pipe: self.pipe.clone(),
            queue: self.tree.queue().clone(),
            workflow_type: W::workflow_type(),
        };
        Sink::new(
            route,
            Rc::new(move |value: V| {
                Box::new(AnyWorkflowAction::<W>::new(map(value))) as Box<dyn Any>
            }),
        )
    }

    /// Number of children declared so far in this pass
    pub fn declared_children(&self) -> usize {
        self.used.len()
    }
}
