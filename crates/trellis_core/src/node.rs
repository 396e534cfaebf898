//! Workflow nodes
//!
//! A [`WorkflowNode`] runs one workflow definition: it owns the state, renders
//! it through its [`SubtreeManager`], reduces notifications from below into
//! state transitions, and reports exactly one [`WorkflowOutput`] per reduced
//! notification to its single listener.
//!
//! # Lifecycle
//!
//! ```text
//! Constructed -> (render <-> idle) -> dropped
//!                 idle -> reducing -> idle   (once per notification)
//! ```
//!
//! Render takes the state by shared reference and reduction needs the node
//! mutably, so the two phases cannot overlap. Dropping a node invalidates
//! every sink it created and reports `on_node_finished`.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::action::WorkflowAction;
use crate::debug::{WorkflowHierarchyDebugSnapshot, WorkflowUpdateDebugInfo};
use crate::error::Result;
use crate::observer::{NodeId, NodeInfo, RenderPassGuard, WorkflowObserver};
use crate::sink::EventQueue;
use crate::subtree::{ChildKey, SubtreeManager, SubtreeOutput};
use crate::workflow::Workflow;

/// Resources shared by every node of one tree: the serial event queue, the
/// optional observer, and the node id counter.
#[derive(Clone, Default)]
pub struct TreeContext {
    queue: EventQueue,
    observer: Option<Rc<dyn WorkflowObserver>>,
    next_id: Rc<Cell<u64>>,
}

impl TreeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: Rc<dyn WorkflowObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::default()
        }
    }

    /// The queue every sink in this tree sends into
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn observer(&self) -> Option<&Rc<dyn WorkflowObserver>> {
        self.observer.as_ref()
    }

    fn allocate_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId::new(id)
    }
}

impl fmt::Debug for TreeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeContext")
            .field("queue", &self.queue)
            .field("has_observer", &self.observer.is_some())
            .field("next_id", &self.next_id.get())
            .finish()
    }
}

/// What a node hands its listener after reducing one notification.
pub struct WorkflowOutput<W: Workflow> {
    /// Externally visible event, if the transition produced one
    pub output_event: Option<W::Output>,
    pub debug_info: WorkflowUpdateDebugInfo,
}

impl<W: Workflow> fmt::Debug for WorkflowOutput<W>
where
    W::Output: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowOutput")
            .field("output_event", &self.output_event)
            .field("debug_info", &self.debug_info)
            .finish()
    }
}

type Listener<W> = Box<dyn FnMut(WorkflowOutput<W>)>;

/// Runs one workflow definition within a tree.
pub struct WorkflowNode<W: Workflow> {
    workflow: W,
    state: W::State,
    subtree_manager: SubtreeManager<W>,
    listener: Option<Listener<W>>,
    missed_outputs: u64,
    info: NodeInfo,
    tree: TreeContext,
}

impl<W: Workflow> WorkflowNode<W> {
    /// Create a root node in `tree`, computing its initial state.
    pub fn new(workflow: W, tree: &TreeContext) -> Self {
        Self::with_path(workflow, tree, Rc::from(Vec::new()))
    }

    /// Create a root node with a private tree: its own queue, no observer.
    pub fn detached(workflow: W) -> Self {
        Self::new(workflow, &TreeContext::new())
    }

    pub(crate) fn with_path(workflow: W, tree: &TreeContext, path: Rc<[ChildKey]>) -> Self {
        let info = NodeInfo {
            id: tree.allocate_id(),
            workflow_type: W::workflow_type(),
            path: Rc::clone(&path),
        };
        let state = workflow.make_initial_state();
        if let Some(observer) = tree.observer() {
            observer.on_node_started(&info);
        }
        Self {
            workflow,
            state,
            subtree_manager: SubtreeManager::new(tree.clone(), path),
            listener: None,
            missed_outputs: 0,
            info,
            tree: tree.clone(),
        }
    }

    /// Render the current state. Sinks created during the pass stay gated
    /// until [`enable_events`](Self::enable_events).
    pub fn render(&mut self, is_root_node: bool) -> W::Rendering {
        let _guard =
            RenderPassGuard::begin(self.tree.observer.clone(), self.info.clone(), is_root_node);
        let workflow = &self.workflow;
        let state = &self.state;
        self.subtree_manager
            .render(|context| workflow.render(state, context))
    }

    /// Enable the sinks of the most recent render pass, recursively.
    /// A no-op before the first render.
    pub fn enable_events(&mut self) {
        self.subtree_manager.enable_events();
    }

    /// Replace the workflow definition. The incoming definition's
    /// `workflow_did_change` runs first, with exclusive access to the state.
    pub fn update(&mut self, workflow: W) {
        tracing::trace!(
            node = self.info.id.get(),
            workflow = W::workflow_type(),
            "updating definition"
        );
        workflow.workflow_did_change(&self.workflow, &mut self.state);
        self.workflow = workflow;
    }

    /// Snapshot of this node and the children of its last render pass.
    pub fn make_debug_snapshot(&self) -> WorkflowHierarchyDebugSnapshot {
        WorkflowHierarchyDebugSnapshot {
            workflow_type: W::workflow_type().to_string(),
            state_description: format!("{:?}", self.state),
            children: self.subtree_manager.child_snapshots(),
        }
    }

    /// Install the single listener, replacing any previous one.
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(WorkflowOutput<W>) + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Outputs dropped because no listener was installed
    pub fn missed_outputs(&self) -> u64 {
        self.missed_outputs
    }

    pub fn state(&self) -> &W::State {
        &self.state
    }

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn subtree(&self) -> &SubtreeManager<W> {
        &self.subtree_manager
    }

    /// Route a queued payload down the tree and reduce what comes back.
    pub(crate) fn deliver(&mut self, path: &[ChildKey], payload: Box<dyn Any>) -> Result<()> {
        let notifications = self.subtree_manager.route(path, payload)?;
        for notification in notifications {
            self.handle_subtree_output(notification);
        }
        Ok(())
    }

    /// The reduction step: one notification in, one output out.
    pub(crate) fn handle_subtree_output(&mut self, notification: SubtreeOutput<W>) {
        let output = match notification {
            SubtreeOutput::Update { action, source } => {
                tracing::trace!(
                    node = self.info.id.get(),
                    action = action.action_type(),
                    "applying action"
                );
                let output_event = action.apply(&mut self.state);
                WorkflowOutput {
                    output_event,
                    debug_info: WorkflowUpdateDebugInfo::did_update(W::workflow_type(), source),
                }
            }
            SubtreeOutput::ChildDidUpdate(child) => WorkflowOutput {
                output_event: None,
                debug_info: WorkflowUpdateDebugInfo::child_did_update(W::workflow_type(), child),
            },
        };
        self.emit(output);
    }

    fn emit(&mut self, output: WorkflowOutput<W>) {
        match self.listener.as_mut() {
            Some(listener) => listener(output),
            None => {
                self.missed_outputs += 1;
                tracing::warn!(
                    node = self.info.id.get(),
                    workflow = W::workflow_type(),
                    missed = self.missed_outputs,
                    "workflow output dropped: no listener installed"
                );
            }
        }
    }
}

impl<W: Workflow> Drop for WorkflowNode<W> {
    fn drop(&mut self) {
        self.subtree_manager.invalidate();
        self.listener = None;
        if let Some(observer) = self.tree.observer() {
            observer.on_node_finished(&self.info);
        }
    }
}

impl<W: Workflow> fmt::Debug for WorkflowNode<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowNode")
            .field("id", &self.info.id)
            .field("workflow", &W::workflow_type())
            .field("state", &self.state)
            .field("children", &self.subtree_manager.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AnyWorkflowAction;
    use crate::debug::{UpdateKind, UpdateSource};
    use crate::sink::{PipeState, Sink};
    use crate::subtree::RenderContext;
    use std::cell::RefCell;

    #[derive(Debug)]
    struct Counter {
        start: i32,
        label: &'static str,
    }

    impl Workflow for Counter {
        type State = i32;
        type Rendering = String;
        type Output = i32;

        fn make_initial_state(&self) -> i32 {
            self.start
        }

        fn render(&self, state: &i32, _context: &mut RenderContext<'_, Self>) -> String {
            format!("{}: {}", self.label, state)
        }
    }

    /// Adds to the counter; reports the total once it reaches ten
    struct Add(i32);

    impl WorkflowAction for Add {
        type Workflow = Counter;

        fn apply(self, state: &mut i32) -> Option<i32> {
            *state += self.0;
            (*state >= 10).then_some(*state)
        }
    }

    struct Parent {
        keys: Vec<&'static str>,
    }

    impl Workflow for Parent {
        type State = ();
        type Rendering = Vec<String>;
        type Output = ();

        fn make_initial_state(&self) {}

        fn render(&self, _state: &(), context: &mut RenderContext<'_, Self>) -> Vec<String> {
            self.keys
                .iter()
                .map(|key| {
                    context.render_child_without_output(Counter { start: 0, label: *key }, *key)
                })
                .collect()
        }
    }

    struct Versioned {
        version: u32,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Workflow for Versioned {
        type State = Vec<u32>;
        type Rendering = u32;
        type Output = ();

        fn make_initial_state(&self) -> Vec<u32> {
            vec![self.version]
        }

        fn workflow_did_change(&self, previous: &Self, state: &mut Vec<u32>) {
            self.log
                .borrow_mut()
                .push(format!("migrate {} -> {}", previous.version, self.version));
            state.push(self.version);
        }

        fn render(&self, _state: &Vec<u32>, _context: &mut RenderContext<'_, Self>) -> u32 {
            self.log.borrow_mut().push(format!("render {}", self.version));
            self.version
        }
    }

    struct Button;

    struct Click;

    impl WorkflowAction for Click {
        type Workflow = Button;

        fn apply(self, state: &mut u32) -> Option<u32> {
            *state += 1;
            (*state % 2 == 0).then_some(*state)
        }
    }

    impl Workflow for Button {
        type State = u32;
        type Rendering = Sink<Click>;
        type Output = u32;

        fn make_initial_state(&self) -> u32 {
            0
        }

        fn render(&self, _state: &u32, context: &mut RenderContext<'_, Self>) -> Sink<Click> {
            context.make_sink()
        }
    }

    struct Exploding;

    impl Workflow for Exploding {
        type State = ();
        type Rendering = ();
        type Output = ();

        fn make_initial_state(&self) {}

        fn render(&self, _state: &(), _context: &mut RenderContext<'_, Self>) {
            panic!("render exploded");
        }
    }

    #[derive(Default)]
    struct Probe {
        calls: RefCell<Vec<String>>,
    }

    impl Probe {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.borrow_mut())
        }
    }

    impl WorkflowObserver for Probe {
        fn on_node_started(&self, node: &NodeInfo) {
            self.calls
                .borrow_mut()
                .push(format!("started {}", node.key().unwrap_or("root")));
        }

        fn on_node_finished(&self, node: &NodeInfo) {
            self.calls
                .borrow_mut()
                .push(format!("finished {}", node.key().unwrap_or("root")));
        }

        fn on_render_started(&self, node: &NodeInfo, is_root_node: bool) {
            self.calls.borrow_mut().push(format!(
                "render started {} {}",
                node.key().unwrap_or("root"),
                is_root_node
            ));
        }

        fn on_render_finished(&self, node: &NodeInfo, is_root_node: bool) {
            self.calls.borrow_mut().push(format!(
                "render finished {} {}",
                node.key().unwrap_or("root"),
                is_root_node
            ));
        }
    }

    fn record_outputs<W: Workflow>(
        node: &mut WorkflowNode<W>,
    ) -> Rc<RefCell<Vec<WorkflowOutput<W>>>> {
        let outputs = Rc::new(RefCell::new(Vec::new()));
        let sender = outputs.clone();
        node.set_listener(move |output| sender.borrow_mut().push(output));
        outputs
    }

    fn external(action: impl WorkflowAction<Workflow = Counter>) -> SubtreeOutput<Counter> {
        SubtreeOutput::Update {
            action: AnyWorkflowAction::new(action),
            source: UpdateSource::External,
        }
    }

    #[test]
    fn test_increment_without_output() {
        let mut node = WorkflowNode::detached(Counter { start: 5, label: "a" });
        let outputs = record_outputs(&mut node);

        node.handle_subtree_output(SubtreeOutput::Update {
            action: AnyWorkflowAction::from_fn(|state: &mut i32| {
                *state += 1;
                None
            }),
            source: UpdateSource::External,
        });

        assert_eq!(*node.state(), 6);
        let outputs = outputs.borrow();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_event, None);
        assert_eq!(
            outputs[0].debug_info,
            WorkflowUpdateDebugInfo::did_update(Counter::workflow_type(), UpdateSource::External)
        );
    }

    #[test]
    fn test_enable_events_before_render_is_noop() {
        let mut node = WorkflowNode::detached(Button);
        node.enable_events();
        assert_eq!(node.subtree().child_count(), 0);

        // The first render still gates its sinks until events are enabled
        let sink = node.render(true);
        assert_eq!(sink.state(), PipeState::Pending);
        node.enable_events();
        assert_eq!(sink.state(), PipeState::Enabled);
    }

    #[test]
    fn test_child_did_update_wraps_one_level() {
        let mut node = WorkflowNode::detached(Counter { start: 3, label: "a" });
        let outputs = record_outputs(&mut node);

        let nested = WorkflowUpdateDebugInfo::child_did_update(
            "Middle",
            WorkflowUpdateDebugInfo::did_update("Leaf", UpdateSource::External),
        );
        node.handle_subtree_output(SubtreeOutput::ChildDidUpdate(nested.clone()));

        assert_eq!(*node.state(), 3);
        let outputs = outputs.borrow();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_event, None);
        assert_eq!(outputs[0].debug_info.workflow_type, Counter::workflow_type());
        assert_eq!(outputs[0].debug_info.kind, UpdateKind::ChildDidUpdate(Box::new(nested)));
    }

    #[test]
    fn test_every_notification_delivered_once_in_order() {
        let mut node = WorkflowNode::detached(Counter { start: 0, label: "a" });
        let outputs = record_outputs(&mut node);

        for step in 1..=6 {
            node.handle_subtree_output(external(Add(step)));
        }

        // Totals: 1, 3, 6, 10, 15, 21; only totals >= 10 are reported
        let events: Vec<Option<i32>> = outputs.borrow().iter().map(|o| o.output_event).collect();
        assert_eq!(events, vec![None, None, None, Some(10), Some(15), Some(21)]);
        assert_eq!(node.missed_outputs(), 0);
    }

    #[test]
    fn test_state_matches_action_applied_to_previous() {
        let mut node = WorkflowNode::detached(Counter { start: 8, label: "a" });
        let _outputs = record_outputs(&mut node);
        let before_id = node.info().id;

        let mut expected = *node.state();
        let expected_output = Add(4).apply(&mut expected);
        node.handle_subtree_output(external(Add(4)));

        assert_eq!(*node.state(), expected);
        assert_eq!(expected_output, Some(12));
        assert_eq!(node.info().id, before_id);
        assert_eq!(node.workflow().label, "a");
    }

    #[test]
    fn test_missing_listener_counts_missed_outputs() {
        let mut node = WorkflowNode::detached(Counter { start: 0, label: "a" });
        node.handle_subtree_output(external(Add(1)));
        node.handle_subtree_output(external(Add(1)));
        assert_eq!(*node.state(), 2);
        assert_eq!(node.missed_outputs(), 2);

        let outputs = record_outputs(&mut node);
        node.handle_subtree_output(external(Add(1)));
        assert_eq!(outputs.borrow().len(), 1);
        assert_eq!(node.missed_outputs(), 2);

        node.clear_listener();
        assert!(!node.has_listener());
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut node = WorkflowNode::detached(Parent {
            keys: vec!["left", "right"],
        });
        let first = node.render(true);
        let second = node.render(true);
        assert_eq!(first, second);
        assert_eq!(first, vec!["left: 0".to_string(), "right: 0".to_string()]);
    }

    #[test]
    fn test_update_migrates_before_next_render() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut node = WorkflowNode::detached(Versioned {
            version: 1,
            log: log.clone(),
        });
        assert_eq!(node.render(true), 1);

        node.update(Versioned {
            version: 2,
            log: log.clone(),
        });
        assert_eq!(*node.state(), vec![1, 2]);
        assert_eq!(node.render(true), 2);

        assert_eq!(
            *log.borrow(),
            vec!["render 1", "migrate 1 -> 2", "render 2"]
        );
    }

    #[test]
    fn test_snapshot_matches_declared_children() {
        let mut node = WorkflowNode::detached(Parent {
            keys: vec!["a", "b", "c"],
        });
        node.render(true);
        let snapshot = node.make_debug_snapshot();
        assert_eq!(snapshot.workflow_type, Parent::workflow_type());
        assert_eq!(snapshot.state_description, "()");
        assert_eq!(snapshot.child_keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(
            snapshot.child("b").map(|c| c.workflow_type.as_str()),
            Some(Counter::workflow_type())
        );

        node.update(Parent {
            keys: vec!["c", "a"],
        });
        // Snapshot reflects the last completed render until the next one
        assert_eq!(node.make_debug_snapshot().child_count(), 3);
        node.render(true);
        let snapshot = node.make_debug_snapshot();
        assert_eq!(snapshot.child_keys().collect::<Vec<_>>(), vec!["c", "a"]);
        assert_eq!(snapshot.node_count(), 3);
    }

    #[test]
    fn test_lifecycle_reported_to_observer() {
        let probe = Rc::new(Probe::default());
        let tree = TreeContext::with_observer(probe.clone());
        let mut node = WorkflowNode::new(
            Parent {
                keys: vec!["a", "b"],
            },
            &tree,
        );
        node.render(true);
        assert_eq!(
            probe.take(),
            vec![
                "started root",
                "render started root true",
                "started a",
                "render started a false",
                "render finished a false",
                "started b",
                "render started b false",
                "render finished b false",
                "render finished root true",
            ]
        );

        node.update(Parent { keys: vec!["b"] });
        node.render(true);
        assert_eq!(
            probe.take(),
            vec![
                "render started root true",
                "render started b false",
                "render finished b false",
                "finished a",
                "render finished root true",
            ]
        );

        drop(node);
        assert_eq!(probe.take(), vec!["finished root", "finished b"]);
    }

    #[test]
    fn test_render_finished_reported_on_panic() {
        let probe = Rc::new(Probe::default());
        let tree = TreeContext::with_observer(probe.clone());
        let mut node = WorkflowNode::new(Exploding, &tree);
        probe.take();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| node.render(false)));
        assert!(result.is_err());
        assert_eq!(
            probe.take(),
            vec!["render started root false", "render finished root false"]
        );
    }

    #[test]
    fn test_dropping_node_invalidates_sinks() {
        let tree = TreeContext::new();
        let mut node = WorkflowNode::new(Button, &tree);
        let sink = node.render(true);
        node.enable_events();
        sink.send(Click);
        assert_eq!(tree.queue().len(), 1);

        drop(node);
        assert_eq!(sink.state(), PipeState::Invalidated);
        sink.send(Click);
        assert_eq!(tree.queue().len(), 1);
    }

    #[test]
    fn test_deliver_routes_sink_actions() {
        let tree = TreeContext::new();
        let mut node = WorkflowNode::new(Button, &tree);
        let outputs = record_outputs(&mut node);
        let sink = node.render(true);
        node.enable_events();

        sink.send(Click);
        sink.send(Click);
        while let Some(event) = tree.queue().pop() {
            node.deliver(&event.path, event.payload).unwrap();
        }

        assert_eq!(*node.state(), 2);
        let events: Vec<Option<u32>> = outputs.borrow().iter().map(|o| o.output_event).collect();
        assert_eq!(events, vec![None, Some(2)]);
    }

    #[test]
    fn test_root_node_ids_are_unique_per_tree() {
        let tree = TreeContext::new();
        let a = WorkflowNode::new(Button, &tree);
        let b = WorkflowNode::new(Button, &tree);
        assert_ne!(a.info().id, b.info().id);
        assert_eq!(a.info().depth(), 0);
    }
}
