//! Workflow host - the owning execution context for a tree.
//!
//! The host is the only way to reach the root node once it exists. It renders
//! and commits, enables events, and drains the tree's event queue, so every
//! render, definition update and reduction happens from one place, one at a
//! time.
//!
//! ```ignore
//! use trellis_core::WorkflowHost;
//!
//! let mut host = WorkflowHost::new(Counter { start: 0 });
//! host.rendering().increment.send(Increment);
//! host.process_events()?;
//! assert_eq!(host.rendering().count, 1);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::HostConfig;
use crate::debug::{WorkflowHierarchyDebugSnapshot, WorkflowUpdateDebugInfo};
use crate::error::Result;
use crate::node::{TreeContext, WorkflowNode, WorkflowOutput};
use crate::observer::WorkflowObserver;
use crate::workflow::Workflow;

type OutputSubscriber<W> = Box<dyn FnMut(&<W as Workflow>::Output)>;
type RenderingSubscriber<W> = Box<dyn FnMut(&<W as Workflow>::Rendering)>;
type Debugger = Box<dyn FnMut(&WorkflowHierarchyDebugSnapshot, Option<&WorkflowUpdateDebugInfo>)>;

/// Drives a workflow tree from a single execution context.
pub struct WorkflowHost<W: Workflow> {
    root: WorkflowNode<W>,
    tree: TreeContext,
    config: HostConfig,
    rendering: W::Rendering,
    root_outputs: Rc<RefCell<VecDeque<WorkflowOutput<W>>>>,
    output_subscribers: Vec<OutputSubscriber<W>>,
    rendering_subscribers: Vec<RenderingSubscriber<W>>,
    debugger: Option<Debugger>,
}

impl<W: Workflow> WorkflowHost<W> {
    /// Start `workflow` with the standard configuration and no observer.
    pub fn new(workflow: W) -> Self {
        Self::build(workflow, HostConfig::standard(), TreeContext::new())
    }

    pub fn with_config(workflow: W, config: HostConfig) -> Self {
        Self::build(workflow, config, TreeContext::new())
    }

    /// Start with an observer attached to every node in the tree.
    pub fn with_observer(
        workflow: W,
        config: HostConfig,
        observer: Rc<dyn WorkflowObserver>,
    ) -> Self {
        Self::build(workflow, config, TreeContext::with_observer(observer))
    }

    fn build(workflow: W, config: HostConfig, tree: TreeContext) -> Self {
        tracing::debug!(
            host = %config.name,
            workflow = W::workflow_type(),
            "starting workflow host"
        );

        let mut root = WorkflowNode::new(workflow, &tree);
        let root_outputs: Rc<RefCell<VecDeque<WorkflowOutput<W>>>> = Rc::default();
        let sender = Rc::downgrade(&root_outputs);
        root.set_listener(move |output| {
            if let Some(outputs) = sender.upgrade() {
                outputs.borrow_mut().push_back(output);
            }
        });

        let rendering = root.render(true);
        root.enable_events();

        Self {
            root,
            tree,
            config,
            rendering,
            root_outputs,
            output_subscribers: Vec::new(),
            rendering_subscribers: Vec::new(),
            debugger: None,
        }
    }

    /// The most recently committed rendering
    pub fn rendering(&self) -> &W::Rendering {
        &self.rendering
    }

    pub fn root(&self) -> &WorkflowNode<W> {
        &self.root
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Events sent but not yet reduced
    pub fn pending_events(&self) -> usize {
        self.tree.queue().len()
    }

    /// Snapshot of the whole tree as of the last render
    pub fn snapshot(&self) -> WorkflowHierarchyDebugSnapshot {
        self.root.make_debug_snapshot()
    }

    /// Called with every output event the root produces.
    pub fn on_output<F>(&mut self, subscriber: F)
    where
        F: FnMut(&W::Output) + 'static,
    {
        self.output_subscribers.push(Box::new(subscriber));
    }

    /// Called with every committed rendering, after events are enabled.
    pub fn on_rendering<F>(&mut self, subscriber: F)
    where
        F: FnMut(&W::Rendering) + 'static,
    {
        self.rendering_subscribers.push(Box::new(subscriber));
    }

    /// Install a debugger. It is immediately given the current snapshot, then
    /// one snapshot per render paired with the update that caused it.
    /// Requires `debug_snapshots` in the config.
    pub fn set_debugger<F>(&mut self, debugger: F)
    where
        F: FnMut(&WorkflowHierarchyDebugSnapshot, Option<&WorkflowUpdateDebugInfo>) + 'static,
    {
        if !self.config.debug_snapshots {
            tracing::warn!(
                host = %self.config.name,
                "debugger installed but debug snapshots are disabled"
            );
        }
        self.debugger = Some(Box::new(debugger));
        self.feed_debugger(None);
    }

    /// Replace the root definition, then render and commit.
    pub fn update(&mut self, workflow: W) {
        self.root.update(workflow);
        self.commit_render(None);
    }

    /// Reduce queued events in arrival order, re-rendering after each one.
    ///
    /// Returns the number of events reduced. Events from discarded nodes are
    /// skipped. At most `max_events_per_drain` events are reduced per call.
    pub fn process_events(&mut self) -> Result<usize> {
        let bound = self.config.drain_bound();
        let mut processed = 0;
        while processed < bound {
            let Some(event) = self.tree.queue().pop() else {
                break;
            };
            if event.is_stale() {
                tracing::debug!(
                    host = %self.config.name,
                    workflow = event.workflow_type,
                    "skipping event from a discarded node"
                );
                continue;
            }

            self.root.deliver(&event.path, event.payload)?;
            processed += 1;

            let outputs: Vec<WorkflowOutput<W>> =
                self.root_outputs.borrow_mut().drain(..).collect();
            for output in outputs {
                self.commit_render(Some(&output.debug_info));
                if let Some(event) = &output.output_event {
                    for subscriber in &mut self.output_subscribers {
                        subscriber(event);
                    }
                }
            }
        }

        if processed > 0 {
            tracing::trace!(
                host = %self.config.name,
                processed,
                remaining = self.pending_events(),
                "drained events"
            );
        }
        Ok(processed)
    }

    fn commit_render(&mut self, update: Option<&WorkflowUpdateDebugInfo>) {
        self.rendering = self.root.render(true);
        self.root.enable_events();
        for subscriber in &mut self.rendering_subscribers {
            subscriber(&self.rendering);
        }
        self.feed_debugger(update);
    }

    fn feed_debugger(&mut self, update: Option<&WorkflowUpdateDebugInfo>) {
        if !self.config.debug_snapshots {
            return;
        }
        if let Some(debugger) = self.debugger.as_mut() {
            let snapshot = self.root.make_debug_snapshot();
            debugger(&snapshot, update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{AnyWorkflowAction, WorkflowAction};
    use crate::error::WorkflowError;
    use crate::observer::NodeInfo;
    use crate::sink::{EventPipe, PipeState, QueuedEvent, Sink};
    use crate::subtree::RenderContext;
    use std::cell::Cell;

    struct Counter;

    struct Increment;

    impl WorkflowAction for Increment {
        type Workflow = Counter;

        fn apply(self, state: &mut u32) -> Option<u32> {
            *state += 1;
            (*state % 2 == 0).then_some(*state)
        }
    }

    struct CounterScreen {
        count: u32,
        increment: Sink<Increment>,
    }

    impl Workflow for Counter {
        type State = u32;
        type Rendering = CounterScreen;
        type Output = u32;

        fn make_initial_state(&self) -> u32 {
            0
        }

        fn render(&self, state: &u32, context: &mut RenderContext<'_, Self>) -> CounterScreen {
            CounterScreen {
                count: *state,
                increment: context.make_sink(),
            }
        }
    }

    struct App {
        labels: Vec<&'static str>,
    }

    impl App {
        fn new(labels: Vec<&'static str>) -> Self {
            Self { labels }
        }
    }

    struct AppScreen {
        log: Vec<String>,
        counters: Vec<CounterScreen>,
    }

    impl Workflow for App {
        type State = Vec<String>;
        type Rendering = AppScreen;
        type Output = String;

        fn make_initial_state(&self) -> Vec<String> {
            Vec::new()
        }

        fn workflow_did_change(&self, previous: &Self, log: &mut Vec<String>) {
            log.push(format!(
                "labels {} -> {}",
                previous.labels.len(),
                self.labels.len()
            ));
        }

        fn render(&self, log: &Vec<String>, context: &mut RenderContext<'_, Self>) -> AppScreen {
            let counters = self
                .labels
                .iter()
                .map(|&label| {
                    context.render_child(Counter, label, move |count| {
                        AnyWorkflowAction::from_fn(move |log: &mut Vec<String>| {
                            let entry = format!("{label} reached {count}");
                            log.push(entry.clone());
                            Some(entry)
                        })
                    })
                })
                .collect();
            AppScreen {
                log: log.clone(),
                counters,
            }
        }
    }

    #[derive(Default)]
    struct Census {
        live: Cell<i64>,
        root_renders: Cell<u32>,
    }

    impl WorkflowObserver for Census {
        fn on_node_started(&self, _node: &NodeInfo) {
            self.live.set(self.live.get() + 1);
        }

        fn on_node_finished(&self, _node: &NodeInfo) {
            self.live.set(self.live.get() - 1);
        }

        fn on_render_finished(&self, _node: &NodeInfo, is_root_node: bool) {
            if is_root_node {
                self.root_renders.set(self.root_renders.get() + 1);
            }
        }
    }

    type Feed = (WorkflowHierarchyDebugSnapshot, Option<WorkflowUpdateDebugInfo>);
    type Feeds = Rc<RefCell<Vec<Feed>>>;

    fn attach_feeds<W: Workflow>(host: &mut WorkflowHost<W>) -> Feeds {
        let feeds: Feeds = Rc::default();
        let sender = feeds.clone();
        host.set_debugger(move |snapshot, update| {
            sender.borrow_mut().push((snapshot.clone(), update.cloned()));
        });
        feeds
    }

    #[test]
    fn test_sink_event_rerenders() {
        let mut host = WorkflowHost::new(Counter);
        let renders = Rc::new(Cell::new(0));
        let seen = renders.clone();
        host.on_rendering(move |_| seen.set(seen.get() + 1));

        host.rendering().increment.send(Increment);
        assert_eq!(host.pending_events(), 1);
        assert_eq!(host.process_events().unwrap(), 1);

        assert_eq!(host.rendering().count, 1);
        assert_eq!(*host.root().state(), 1);
        assert_eq!(renders.get(), 1);
        assert_eq!(host.pending_events(), 0);
    }

    #[test]
    fn test_rendering_subscribers_see_enabled_sinks() {
        let mut host = WorkflowHost::new(Counter);
        let states = Rc::new(RefCell::new(Vec::new()));
        let sender = states.clone();
        host.on_rendering(move |screen: &CounterScreen| {
            sender.borrow_mut().push(screen.increment.state());
        });

        host.rendering().increment.send(Increment);
        host.process_events().unwrap();
        host.update(Counter);
        assert_eq!(*states.borrow(), vec![PipeState::Enabled, PipeState::Enabled]);
    }

    #[test]
    fn test_child_outputs_reach_output_subscribers() {
        let mut host = WorkflowHost::new(App::new(vec!["left", "right"]));
        let outputs = Rc::new(RefCell::new(Vec::new()));
        let sender = outputs.clone();
        host.on_output(move |event: &String| sender.borrow_mut().push(event.clone()));

        let left = host.rendering().counters[0].increment.clone();
        let right = host.rendering().counters[1].increment.clone();
        left.send(Increment);
        right.send(Increment);
        left.send(Increment);
        assert_eq!(host.process_events().unwrap(), 3);

        assert_eq!(*outputs.borrow(), vec!["left reached 2"]);
        assert_eq!(host.rendering().counters[0].count, 2);
        assert_eq!(host.rendering().counters[1].count, 1);
        assert_eq!(host.rendering().log, vec!["left reached 2"]);
    }

    #[test]
    fn test_debugger_fed_on_install_and_each_render() {
        let mut host = WorkflowHost::with_config(App::new(vec!["left"]), HostConfig::testing());
        let feeds = attach_feeds(&mut host);
        assert_eq!(feeds.borrow().len(), 1);
        assert!(feeds.borrow()[0].1.is_none());

        host.rendering().counters[0].increment.send(Increment);
        host.process_events().unwrap();

        let feeds = feeds.borrow();
        assert_eq!(feeds.len(), 2);
        let (snapshot, update) = &feeds[1];
        assert_eq!(
            snapshot.find(&["left"]).map(|c| c.state_description.as_str()),
            Some("1")
        );
        let update = update.as_ref().unwrap();
        assert_eq!(update.path(), vec![App::workflow_type(), Counter::workflow_type()]);
        assert_eq!(update.originating().workflow_type, Counter::workflow_type());
        assert!(update.originating().is_direct());
    }

    #[test]
    fn test_debugger_silent_without_snapshots() {
        let mut host = WorkflowHost::new(Counter);
        let feeds = attach_feeds(&mut host);
        host.rendering().increment.send(Increment);
        host.process_events().unwrap();
        assert!(feeds.borrow().is_empty());
    }

    #[test]
    fn test_drain_is_bounded() {
        let config = HostConfig::standard().with_max_events_per_drain(2);
        let mut host = WorkflowHost::with_config(Counter, config);
        for _ in 0..5 {
            host.rendering().increment.send(Increment);
        }

        assert_eq!(host.process_events().unwrap(), 2);
        assert_eq!(host.pending_events(), 3);
        assert_eq!(host.process_events().unwrap(), 2);
        assert_eq!(host.process_events().unwrap(), 1);
        assert_eq!(host.process_events().unwrap(), 0);
        assert_eq!(host.rendering().count, 5);
    }

    #[test]
    fn test_zero_drain_bound_still_reduces() {
        let config: HostConfig = serde_json::from_str(
            r#"{"name":"zero","max_events_per_drain":0,"debug_snapshots":false}"#,
        )
        .unwrap();
        let mut host = WorkflowHost::with_config(Counter, config);
        host.rendering().increment.send(Increment);
        host.rendering().increment.send(Increment);

        assert_eq!(host.process_events().unwrap(), 1);
        assert_eq!(host.pending_events(), 1);
        assert_eq!(host.process_events().unwrap(), 1);
        assert_eq!(host.rendering().count, 2);
    }

    #[test]
    fn test_update_discards_events_of_removed_children() {
        let mut host = WorkflowHost::new(App::new(vec!["left", "right"]));
        host.rendering().counters[1].increment.send(Increment);

        host.update(App::new(vec!["left"]));
        assert_eq!(host.rendering().log, vec!["labels 2 -> 1"]);
        assert_eq!(host.rendering().counters.len(), 1);

        assert_eq!(host.pending_events(), 1);
        assert_eq!(host.process_events().unwrap(), 0);
        assert_eq!(host.pending_events(), 0);
    }

    #[test]
    fn test_observer_tracks_node_lifetimes() {
        let census = Rc::new(Census::default());
        let mut host = WorkflowHost::with_observer(
            App::new(vec!["a", "b"]),
            HostConfig::standard(),
            census.clone(),
        );
        assert_eq!(census.live.get(), 3);
        assert_eq!(census.root_renders.get(), 1);

        host.update(App::new(vec!["a"]));
        assert_eq!(census.live.get(), 2);
        assert_eq!(census.root_renders.get(), 2);

        drop(host);
        assert_eq!(census.live.get(), 0);
    }

    #[test]
    fn test_mismatched_event_is_an_error() {
        let mut host = WorkflowHost::new(Counter);
        host.tree.queue().push(QueuedEvent {
            path: Rc::from(Vec::new()),
            pipe: EventPipe::new(),
            payload: Box::new(1u8),
            workflow_type: "bogus",
        });

        assert_eq!(
            host.process_events(),
            Err(WorkflowError::ActionTypeMismatch {
                expected: Counter::workflow_type(),
            })
        );
        assert_eq!(host.rendering().count, 0);
    }
}
