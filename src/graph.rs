use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::observer::{LifecycleObserver, ObserverList};
use crate::queue::HashByRef;
use crate::time::NanoTime;
use crate::types::Node;

use log::debug;
use once_cell::sync::Lazy;
use std::cmp::max;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

static GRAPH_ID: Lazy<Mutex<usize>> = Lazy::new(|| Mutex::new(0));

struct NodeData {
    node: Rc<dyn Node>,
    upstreams: Vec<(usize, bool)>,
    downstreams: Vec<(usize, bool)>,
}

/// Whether the graph should run back-test (as-fast-as-possible, logical
/// time only) or real-time (wall-clock-aligned) mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunMode {
    RealTime,
    BackTestFrom(NanoTime),
}

impl RunMode {
    pub fn start_time(&self) -> NanoTime {
        match self {
            RunMode::RealTime => NanoTime::now(),
            RunMode::BackTestFrom(start_time) => *start_time,
        }
    }
}

/// How long the graph should run for: wall/logical duration, a cycle count,
/// or until explicitly stopped.
#[derive(Clone, Copy, Debug)]
pub enum RunFor {
    Duration(Duration),
    Cycles(u32),
    Forever,
}

/// Maintains the parts of the graph state visible to nodes during a cycle:
/// the current time, which node is presently evaluating, and the run
/// parameters. Holds the [ExecutionContext] and the per-node `schedule[]`
/// vector described in §4.3.
pub struct GraphState {
    id: usize,
    context: ExecutionContext,
    observers: ObserverList,
    current_node_index: Option<usize>,
    node_to_index: HashMap<HashByRef<dyn Node>, usize>,
    nodes: Vec<NodeData>,
    schedule: Vec<NanoTime>,
    /// Transient per-tick "an active upstream ticked earlier this same
    /// pass" flag, cleared at the start of every [Graph::evaluate_graph].
    /// Ascending index order guarantees a downstream node's flag is set
    /// before the loop reaches it, so it fires in the same tick as its
    /// upstream rather than the next one (§4.4 ordering guarantee).
    fire_now: Vec<bool>,
    /// The engine time each node last ticked at, `MAX_DT` until it first
    /// fires. Backs [GraphState::ticked] and [GraphState::has_ticked] so a
    /// node with several upstreams (merge, filter) can tell which one
    /// actually produced this tick, and whether an upstream is "valid" (has
    /// ever ticked) at all.
    last_ticked: Vec<NanoTime>,
    push_source_nodes_end: usize,
    run_mode: RunMode,
    run_for: RunFor,
    start_time: NanoTime,
    current_cycle: u32,
}

impl GraphState {
    fn new(context: ExecutionContext, run_mode: RunMode, run_for: RunFor, start_time: NanoTime) -> Self {
        let mut id = GRAPH_ID.lock().unwrap();
        let state = Self {
            id: *id,
            context,
            observers: ObserverList::new(),
            current_node_index: None,
            node_to_index: HashMap::new(),
            nodes: Vec::new(),
            schedule: Vec::new(),
            fire_now: Vec::new(),
            last_ticked: Vec::new(),
            push_source_nodes_end: 0,
            run_mode,
            run_for,
            start_time,
            current_cycle: 0,
        };
        *id += 1;
        state
    }

    pub fn time(&self) -> NanoTime {
        self.context.current_engine_time()
    }

    pub fn elapsed(&self) -> NanoTime {
        self.time() - self.start_time
    }

    pub fn start_time(&self) -> NanoTime {
        self.start_time
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn run_for(&self) -> RunFor {
        self.run_for
    }

    /// Whether the run loop will not evaluate the graph again after this
    /// cycle. Only meaningful under [RunFor::Cycles]; always `false` for
    /// [RunFor::Duration] and [RunFor::Forever], since those stop on a time
    /// or external condition a node can't see in advance.
    pub fn is_last_cycle(&self) -> bool {
        match self.run_for {
            RunFor::Cycles(n) => self.current_cycle + 1 >= n,
            RunFor::Duration(_) | RunFor::Forever => false,
        }
    }

    pub fn request_engine_stop(&mut self) {
        self.context.request_engine_stop();
    }

    /// Handle a push-source node stashes away at `start` and hands to its
    /// external producer thread.
    pub fn push_notifier(&self) -> crate::context::PushNotifier {
        self.context.push_notifier()
    }

    pub fn is_real_time(&self) -> bool {
        self.context.is_real_time()
    }

    pub fn node_index(&self, node: Rc<dyn Node>) -> Option<usize> {
        self.node_to_index.get(&HashByRef::new(node)).copied()
    }

    /// Whether `node` produced a value at the current engine time — the
    /// per-upstream complement to a node's own return value, for combinators
    /// wired to several upstreams (merge, filter-by-condition) that need to
    /// know which one just ticked.
    pub fn ticked(&self, node: Rc<dyn Node>) -> bool {
        match self.node_index(node) {
            Some(ix) => self.last_ticked[ix] == self.time(),
            None => false,
        }
    }

    /// Whether `node` has ever produced a value, at or before the current
    /// engine time — the "valid input" concept (GLOSSARY), used to gate a
    /// combinator from firing off an upstream's default value before that
    /// upstream has ticked for the first time (§4.2 input-validity gate).
    pub fn has_ticked(&self, node: Rc<dyn Node>) -> bool {
        match self.node_index(node) {
            Some(ix) => self.last_ticked[ix] != NanoTime::MAX_DT,
            None => false,
        }
    }

    fn seen(&self, node: Rc<dyn Node>) -> bool {
        self.node_to_index.contains_key(&HashByRef::new(node))
    }

    fn current_index(&self) -> usize {
        self.current_node_index
            .expect("schedule_node/notify called outside of node lifecycle/eval")
    }

    /// §4.3: narrows `schedule[index]` towards `when`, never widening it,
    /// and informs the context so the executor does not sleep past it.
    /// `evaluate_graph` resets a node's entry to `MAX_DT` at the moment it
    /// consumes a due timer, so a node re-registering further out after
    /// firing still narrows cleanly from that reset value.
    pub(crate) fn schedule_node(&mut self, index: usize, when: NanoTime) {
        if when < self.schedule[index] {
            self.schedule[index] = when;
            self.context.update_next_proposed_time(when);
        }
    }

    /// Called by the currently-evaluating node's own scheduler.
    pub fn schedule_current_node(&mut self, when: NanoTime) {
        let index = self.current_index();
        self.schedule_node(index, when);
    }

    /// Registers `f` to run once, immediately before the graph's next tick
    /// begins (§4.5 one-shot notifications), FIFO against any other
    /// before-callback registered this tick.
    pub fn notify_before_evaluation(&mut self, f: impl FnOnce(&mut ExecutionContext) + 'static) {
        self.context.notify_before_evaluation(f);
    }

    /// Registers `f` to run once, immediately after the current tick's
    /// evaluation pass completes (§4.5 one-shot notifications), LIFO
    /// against any other after-callback registered this tick.
    pub fn notify_after_evaluation(&mut self, f: impl FnOnce(&mut ExecutionContext) + 'static) {
        self.context.notify_after_evaluation(f);
    }

    pub fn log(&self, level: log::Level, msg: &str) {
        if log::log_enabled!(level) {
            if let Some(ix) = self.current_node_index {
                let id = self.id;
                let type_name = self.nodes[ix].node.type_name();
                log::log!(target: &type_name, level, "[{id},{ix}] {msg}");
            }
        }
    }
}

/// Coordinates execution of a wired set of [Node]s (§4.4): the graph
/// executor.
pub struct Graph {
    pub(crate) state: GraphState,
    started: bool,
}

impl Graph {
    /// Builds a graph from its sink/root nodes, routing them through the
    /// declared [crate::builder::GraphBuilderFactory] (or the built-in
    /// default, if none is declared) before wiring (§6). Everything
    /// reachable through `upstreams()` transitively is pulled in.
    pub fn new(roots: Vec<Rc<dyn Node>>, run_mode: RunMode, run_for: RunFor) -> Graph {
        Self::from_builder(crate::builder::make(roots), run_mode, run_for)
    }

    /// Builds a graph from an already-constructed [crate::builder::GraphBuilder],
    /// bypassing the declared-factory indirection `new` goes through.
    pub fn from_builder(builder: crate::builder::GraphBuilder, run_mode: RunMode, run_for: RunFor) -> Graph {
        let start_time = run_mode.start_time();
        let context = match run_mode {
            RunMode::RealTime => ExecutionContext::real_time(start_time),
            RunMode::BackTestFrom(t) => ExecutionContext::back_test(t),
        };
        let state = GraphState::new(context, run_mode, run_for, start_time);
        let mut graph = Graph {
            state,
            started: false,
        };
        graph.initialise(builder.roots);
        graph
    }

    pub fn add_observer(&mut self, observer: Box<dyn LifecycleObserver>) {
        self.state.observers.add(observer);
    }

    fn initialise(&mut self, roots: Vec<Rc<dyn Node>>) {
        let timer = Instant::now();
        for node in roots {
            if !self.state.seen(node.clone()) {
                self.initialise_node(&node);
            }
        }
        self.rank_and_partition();
        debug!(
            "{} nodes wired in {:?} ({} push sources)",
            self.state.nodes.len(),
            timer.elapsed(),
            self.state.push_source_nodes_end
        );
    }

    fn initialise_node(&mut self, node: &Rc<dyn Node>) -> usize {
        if self.state.seen(node.clone()) {
            return self.state.node_index(node.clone()).unwrap();
        }
        let upstreams = node.upstreams();
        let mut upstream_indexes = Vec::new();
        for up in &upstreams.active {
            upstream_indexes.push((self.initialise_node(up), true));
        }
        for up in &upstreams.passive {
            upstream_indexes.push((self.initialise_node(up), false));
        }
        let index = self.state.nodes.len();
        self.state
            .node_to_index
            .insert(HashByRef::new(node.clone()), index);
        self.state.nodes.push(NodeData {
            node: node.clone(),
            upstreams: upstream_indexes,
            downstreams: Vec::new(),
        });
        index
    }

    /// Computes each node's topological rank (0 for push sources and other
    /// sourceless nodes, `1 + max(upstream rank)` otherwise), then
    /// renumbers nodes so push sources occupy `0..push_source_nodes_end`
    /// and the rest follow in ascending rank order (§3, §6 rank algorithm).
    ///
    /// `initialise_node` discovers upstreams before the node itself, so the
    /// original discovery order is already a valid topological order: every
    /// upstream's original index is lower than its downstream's. That makes
    /// a single forward pass enough to compute ranks.
    fn rank_and_partition(&mut self) {
        let n = self.state.nodes.len();
        let is_push_source: Vec<bool> = self
            .state
            .nodes
            .iter()
            .map(|d| d.node.is_push_source())
            .collect();
        let mut rank = vec![0usize; n];
        for i in 0..n {
            rank[i] = self.state.nodes[i]
                .upstreams
                .iter()
                .map(|&(up, _)| rank[up] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| (!is_push_source[i], rank[i], i));

        let mut new_index = vec![0usize; n];
        for (new_i, &old_i) in order.iter().enumerate() {
            new_index[old_i] = new_i;
        }

        let mut slots: Vec<Option<NodeData>> = self.state.nodes.drain(..).map(Some).collect();
        let mut renumbered: Vec<NodeData> = order
            .iter()
            .map(|&old_i| {
                let mut data = slots[old_i].take().unwrap();
                data.upstreams = data
                    .upstreams
                    .iter()
                    .map(|&(up, active)| (new_index[up], active))
                    .collect();
                data
            })
            .collect();

        for new_i in 0..n {
            let ups = renumbered[new_i].upstreams.clone();
            for (up, active) in ups {
                renumbered[up].downstreams.push((new_i, active));
            }
        }

        self.state.node_to_index = renumbered
            .iter()
            .enumerate()
            .map(|(i, data)| (HashByRef::new(data.node.clone()), i))
            .collect();
        self.state.nodes = renumbered;
        // MAX_DT means "nothing scheduled"; a node only fires once something
        // (its own start(), or a later schedule_current_node call) narrows
        // this down to a real time.
        self.state.schedule = vec![NanoTime::MAX_DT; n];
        self.state.fire_now = vec![false; n];
        self.state.last_ticked = vec![NanoTime::MAX_DT; n];
        self.state.push_source_nodes_end =
            order.iter().take_while(|&&old_i| is_push_source[old_i]).count();
    }

    pub(crate) fn setup_nodes(&mut self) -> anyhow::Result<()> {
        self.apply_nodes(|node, state| node.setup(state))
    }

    pub(crate) fn start_nodes(&mut self) -> anyhow::Result<()> {
        for ix in 0..self.state.nodes.len() {
            self.state.current_node_index = Some(ix);
            self.state.observers.before_start_node(ix);
            let node = self.state.nodes[ix].node.clone();
            node.start(&mut self.state)?;
            self.state.observers.after_start_node(ix);
            self.state.current_node_index = None;
        }
        Ok(())
    }

    /// Best-effort per §4.3: continues past individual node failures so
    /// every node gets a chance to release its resources, then re-raises
    /// the first error encountered.
    pub(crate) fn stop_nodes(&mut self) -> anyhow::Result<()> {
        let mut first_err = None;
        for ix in 0..self.state.nodes.len() {
            self.state.current_node_index = Some(ix);
            self.state.observers.before_stop_node(ix);
            let node = self.state.nodes[ix].node.clone();
            if let Err(e) = node.stop(&mut self.state) {
                first_err.get_or_insert(e);
            }
            self.state.observers.after_stop_node(ix);
            self.state.current_node_index = None;
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn teardown_nodes(&mut self) -> anyhow::Result<()> {
        let mut first_err = None;
        for ix in 0..self.state.nodes.len() {
            self.state.current_node_index = Some(ix);
            let node = self.state.nodes[ix].node.clone();
            if let Err(e) = node.teardown(&mut self.state) {
                first_err.get_or_insert(e);
            }
            self.state.current_node_index = None;
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply_nodes(
        &mut self,
        func: impl Fn(Rc<dyn Node>, &mut GraphState) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for ix in 0..self.state.nodes.len() {
            self.state.current_node_index = Some(ix);
            let node = self.state.nodes[ix].node.clone();
            func(node, &mut self.state)?;
            self.state.current_node_index = None;
        }
        Ok(())
    }

    fn resolve_end_time(&self) -> NanoTime {
        match self.state.run_for {
            RunFor::Duration(d) => self.state.start_time + d,
            RunFor::Cycles(_) | RunFor::Forever => NanoTime::MAX_DT,
        }
    }

    /// The run loop (§4.4): scoped start/stop guard around repeated
    /// `evaluate_graph`/`advance_engine_time` until the engine time passes
    /// `end_time`. A [Graph] is single-run only — `GraphState`'s schedule,
    /// cycle count and engine time aren't reset between runs, so calling
    /// this a second time is rejected rather than silently re-running.
    pub fn run(&mut self) -> anyhow::Result<()> {
        if self.started {
            return Err(EngineError::AlreadyStarted { node_index: 0 }.into());
        }
        self.started = true;

        let start_time = self.state.start_time;
        let end_time = self.resolve_end_time();
        if end_time < start_time {
            return Err(EngineError::InvalidTimeRange {
                start_time,
                end_time,
            }
            .into());
        }

        self.state.observers.before_start_graph();
        self.setup_nodes()?;

        // stop_nodes()/teardown_nodes() must run on every exit path out of
        // this block, including one where start_nodes() itself fails
        // partway through (§4.4 scoped start/stop guard).
        let stop_result = std::cell::RefCell::new(Ok(()));
        let run_result = {
            let mut guard = scopeguard::guard(self, |graph| {
                graph.state.observers.before_stop_graph();
                let stopped = graph.stop_nodes();
                graph.state.observers.after_stop_graph();
                let torn_down = graph.teardown_nodes();
                *stop_result.borrow_mut() = stopped.and(torn_down);
            });
            let start_result = guard.start_nodes();
            guard.state.observers.after_start_graph();
            start_result.and_then(|()| guard.run_loop(end_time))
        };

        run_result?;
        stop_result.into_inner()
    }

    fn run_loop(&mut self, end_time: NanoTime) -> anyhow::Result<()> {
        let mut cycles: u32 = 0;
        let max_cycles = match self.state.run_for {
            RunFor::Cycles(c) => Some(c),
            _ => None,
        };
        let run_timer = Instant::now();
        while self.state.context.current_engine_time() <= end_time {
            if let Some(max_cycles) = max_cycles {
                if cycles >= max_cycles {
                    break;
                }
            }
            self.state.current_cycle = cycles;
            self.evaluate_graph()?;
            cycles += 1;
            self.state.context.advance_engine_time(end_time);
        }
        debug!(
            "graph {} completed {} cycles in {:?}",
            self.state.id,
            cycles,
            run_timer.elapsed()
        );
        Ok(())
    }

    /// One tick, §4.4: drains one-shot before-notifications, drains any
    /// pending push sources, fires ordinary nodes whose schedule has come
    /// due, then drains one-shot after-notifications.
    fn evaluate_graph(&mut self) -> anyhow::Result<()> {
        self.state.context.drain_before_eval();
        let now = self.state.context.current_engine_time();
        self.state.observers.before_evaluation(now);

        if self.state.context.push_has_pending_values() {
            self.state.context.reset_push_has_pending_values();
            for i in 0..self.state.push_source_nodes_end {
                self.cycle_node(i, false)?;
            }
        }

        let ordinary_start = self.state.push_source_nodes_end;
        for i in ordinary_start..self.state.nodes.len() {
            self.state.fire_now[i] = false;
        }
        for i in ordinary_start..self.state.nodes.len() {
            let timer_due = self.state.schedule[i] == now;
            let due = self.state.fire_now[i] || timer_due;
            if due {
                // Reset to "nothing scheduled" before the node's own cycle()
                // runs, so its own re-registration (schedule_current_node)
                // narrows cleanly from MAX_DT rather than being rejected by
                // the now-stale due time it's consuming.
                if timer_due {
                    self.state.schedule[i] = NanoTime::MAX_DT;
                }
                self.cycle_node(i, true)?;
            } else if self.state.schedule[i] > now {
                self.state.context.update_next_proposed_time(self.state.schedule[i]);
            }
            // schedule[i] < now: nothing pending for this node; a correctly
            // maintained schedule should not produce this.
        }

        self.state.observers.after_evaluation(now);
        self.state.context.drain_after_eval();
        Ok(())
    }

    /// Evaluates one node and, if it ticked, wakes its active downstreams
    /// for the same tick by flagging them in `fire_now` (§4.4 ordering
    /// guarantee). Ascending index order means every downstream index is
    /// still ahead of us in the current `evaluate_graph` sweep.
    fn cycle_node(&mut self, index: usize, observe: bool) -> anyhow::Result<()> {
        let now = self.state.context.current_engine_time();
        if observe {
            self.state.observers.before_node_evaluation(index, now);
        }
        self.state.current_node_index = Some(index);
        let node = self.state.nodes[index].node.clone();
        let result = node.cycle(&mut self.state);
        self.state.current_node_index = None;
        if observe {
            self.state.observers.after_node_evaluation(index, now);
        }
        let ticked = result.map_err(|e| EngineError::NodeEvalFailed {
            node_index: index,
            source: e,
        })?;
        if ticked {
            self.state.last_ticked[index] = now;
            for i in 0..self.state.nodes[index].downstreams.len() {
                let (downstream_index, active) = self.state.nodes[index].downstreams[i];
                if active {
                    self.state.fire_now[downstream_index] = true;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LifecycleObserver;
    use crate::scheduler::NodeScheduler;
    use crate::types::{
        AsNode, IntoNode, IntoStream, MutableNode, Stream, StreamPeek, StreamPeekRef, UpStreams,
    };
    use std::cell::RefCell;

    /// Fires on its own schedule every `period` engine-time units, counting
    /// up from zero. Exercises the scheduler-timer path (no inputs).
    struct TickCounter {
        value: i64,
        period: NanoTime,
    }

    impl MutableNode for TickCounter {
        fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
            self.value += 1;
            state.schedule_current_node(state.time() + self.period);
            Ok(true)
        }

        fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            state.schedule_current_node(state.start_time());
            Ok(())
        }
    }

    impl StreamPeekRef<i64> for TickCounter {
        fn peek_ref(&self) -> &i64 {
            &self.value
        }
    }

    /// Doubles its upstream's value every time the upstream ticks. Has no
    /// timer of its own: it only ever fires via the active-input wakeup.
    struct Doubler {
        upstream: Rc<dyn Stream<i64>>,
        value: i64,
    }

    impl MutableNode for Doubler {
        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.upstream.clone().as_node()], Vec::new())
        }

        fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
            self.value = self.upstream.peek_value() * 2;
            Ok(true)
        }
    }

    impl StreamPeekRef<i64> for Doubler {
        fn peek_ref(&self) -> &i64 {
            &self.value
        }
    }

    /// A node with a tagged, rescheduling timer, used to check that
    /// same-tag replacement narrows the schedule correctly end-to-end.
    struct TaggedTimer {
        scheduler: NodeScheduler,
        fired_at: Vec<NanoTime>,
    }

    impl MutableNode for TaggedTimer {
        fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            self.scheduler.set_started(false);
            self.scheduler
                .schedule(state.start_time() + NanoTime::new(10), Some("beat"), state.time());
            self.scheduler.set_started(true);
            state.schedule_current_node(state.start_time() + NanoTime::new(10));
            Ok(())
        }

        fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
            self.fired_at.push(state.time());
            // replace the outstanding "beat" entry rather than stacking a
            // second one
            self.scheduler
                .schedule(state.time() + NanoTime::new(10), Some("beat"), state.time());
            if let Some(next) = self.scheduler.advance(state.time()) {
                state.schedule_current_node(next);
            }
            Ok(true)
        }
    }

    /// A node that requests the engine stop partway through a back-test run.
    struct StopAfter {
        remaining: u32,
    }

    impl MutableNode for StopAfter {
        fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            state.schedule_current_node(state.start_time());
            Ok(())
        }

        fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
            if self.remaining == 0 {
                state.request_engine_stop();
                return Ok(false);
            }
            self.remaining -= 1;
            state.schedule_current_node(state.time().next_instant());
            Ok(true)
        }
    }

    #[test]
    fn single_compute_chain_back_test_ticks_downstream_same_cycle() {
        let counter = TickCounter {
            value: 0,
            period: NanoTime::new(1),
        }
        .into_stream();
        let doubler = Doubler {
            upstream: counter.clone(),
            value: 0,
        }
        .into_stream();

        let mut graph = Graph::new(
            vec![doubler.clone().as_node()],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Cycles(5),
        );
        graph.run().unwrap();

        assert_eq!(counter.peek_value(), 5);
        assert_eq!(doubler.peek_value(), 10, "downstream must see the same-tick update");
    }

    /// A source with no inputs that identifies itself as a push source, so
    /// the rank/partition pass must place it ahead of ordinary nodes
    /// regardless of where it appears among the roots.
    struct PushishSource {
        value: i64,
    }

    impl MutableNode for PushishSource {
        fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
            self.value += 1;
            Ok(true)
        }

        fn is_push_source(&self) -> bool {
            true
        }
    }

    impl StreamPeekRef<i64> for PushishSource {
        fn peek_ref(&self) -> &i64 {
            &self.value
        }
    }

    #[test]
    fn rank_and_partition_orders_push_sources_before_ordinary_nodes() {
        let counter = TickCounter {
            value: 0,
            period: NanoTime::new(1),
        }
        .into_stream();
        // wire the push source as a second root so it isn't discovered first
        let push_source = PushishSource { value: 0 }.into_stream();
        let graph = Graph::new(
            vec![counter.clone().as_node(), push_source.clone().as_node()],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Cycles(0),
        );
        assert_eq!(graph.state.push_source_nodes_end, 1);
        assert!(graph.state.nodes[0].node.is_push_source());
        assert!(!graph.state.nodes[1].node.is_push_source());
    }

    #[test]
    fn scheduler_tagged_replacement_keeps_a_single_outstanding_timer() {
        let timer = Rc::new(RefCell::new(TaggedTimer {
            scheduler: NodeScheduler::new(),
            fired_at: Vec::new(),
        }));
        let node: Rc<dyn Node> = timer.clone();

        let mut graph = Graph::new(
            vec![node],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Duration(std::time::Duration::from_nanos(35)),
        );
        graph.run().unwrap();

        assert_eq!(
            timer.borrow().fired_at,
            vec![NanoTime::new(10), NanoTime::new(20), NanoTime::new(30)]
        );
    }

    #[test]
    fn stop_request_mid_run_halts_before_run_for_is_exhausted() {
        let node = StopAfter { remaining: 2 }.into_node();
        let mut graph = Graph::new(
            vec![node],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Cycles(1_000),
        );
        graph.run().unwrap();
        // requests stop on its 3rd cycle (remaining 2, 1, 0); should not run
        // anywhere near the full 1000-cycle budget
        assert!(graph.state.context.current_engine_time() < NanoTime::new(100));
    }

    /// Has its own periodic timer and an active upstream. Used to check
    /// that a fire driven by the upstream's wake cannot widen this node's
    /// own still-outstanding timer entry (§4.3 schedule_node narrowing).
    struct NarrowCheck {
        upstream: Rc<dyn Stream<i64>>,
        own_timer_at: NanoTime,
        fired_via_upstream: Vec<NanoTime>,
        fired_via_timer: Vec<NanoTime>,
    }

    impl MutableNode for NarrowCheck {
        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.upstream.clone().as_node()], Vec::new())
        }

        fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
            state.schedule_current_node(self.own_timer_at);
            Ok(())
        }

        fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
            let now = state.time();
            if now == self.own_timer_at {
                self.fired_via_timer.push(now);
            } else {
                self.fired_via_upstream.push(now);
                // attempt to widen past the still-outstanding timer entry;
                // narrowing semantics must reject this
                state.schedule_current_node(now + NanoTime::new(5_000));
            }
            Ok(true)
        }
    }

    #[test]
    fn schedule_node_narrows_rather_than_widens() {
        let upstream = TickCounter {
            value: 0,
            period: NanoTime::new(100),
        }
        .into_stream();
        let node = Rc::new(RefCell::new(NarrowCheck {
            upstream,
            own_timer_at: NanoTime::new(1_000),
            fired_via_upstream: Vec::new(),
            fired_via_timer: Vec::new(),
        }));
        let as_node: Rc<dyn Node> = node.clone();

        let mut graph = Graph::new(
            vec![as_node],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Duration(Duration::from_nanos(1_000)),
        );
        graph.run().unwrap();

        assert!(!node.borrow().fired_via_upstream.is_empty());
        assert_eq!(node.borrow().fired_via_timer, vec![NanoTime::new(1_000)]);
    }

    #[test]
    fn running_an_already_run_graph_is_rejected() {
        let node = StopAfter { remaining: 0 }.into_node();
        let mut graph = Graph::new(
            vec![node],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Cycles(10),
        );
        graph.run().unwrap();
        let err = graph.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::AlreadyStarted { .. })
        ));
    }

    #[test]
    fn stop_and_teardown_still_run_when_start_fails() {
        struct FailsToStart;
        impl MutableNode for FailsToStart {
            fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
                Ok(false)
            }
            fn start(&mut self, _state: &mut GraphState) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("boom"))
            }
        }

        struct RecordsStop(Rc<RefCell<bool>>);
        impl MutableNode for RecordsStop {
            fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
                Ok(false)
            }
            fn stop(&mut self, _state: &mut GraphState) -> anyhow::Result<()> {
                *self.0.borrow_mut() = true;
                Ok(())
            }
        }

        let stopped = Rc::new(RefCell::new(false));
        let mut graph = Graph::new(
            vec![
                FailsToStart.into_node(),
                RecordsStop(stopped.clone()).into_node(),
            ],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Cycles(1),
        );
        assert!(graph.run().is_err());
        assert!(*stopped.borrow(), "stop() must still run after a failed start()");
    }

    #[test]
    fn observers_see_node_evaluation_around_each_fire() {
        struct Seen(Rc<RefCell<Vec<usize>>>);
        impl LifecycleObserver for Seen {
            fn on_after_node_evaluation(&mut self, node_index: usize, _time: NanoTime) {
                self.0.borrow_mut().push(node_index);
            }
        }

        let counter = TickCounter {
            value: 0,
            period: NanoTime::new(1),
        }
        .into_stream();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut graph = Graph::new(
            vec![counter.as_node()],
            RunMode::BackTestFrom(NanoTime::ZERO),
            RunFor::Cycles(3),
        );
        graph.add_observer(Box::new(Seen(seen.clone())));
        graph.run().unwrap();

        assert_eq!(seen.borrow().len(), 3);
    }
}
