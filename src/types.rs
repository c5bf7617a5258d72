use derive_new::new;
use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::rc::Rc;

pub use crate::graph::GraphState;
pub use crate::time::NanoTime;

/// The graph asks a [Node] what its upstream sources are. The node replies
/// with a [UpStreams] of active and passive sources. Active upstreams wake
/// their downstream node when they tick; passive upstreams are wired in but
/// never trigger evaluation on their own.
#[derive(new, Default)]
pub struct UpStreams {
    pub active: Vec<Rc<dyn Node>>,
    pub passive: Vec<Rc<dyn Node>>,
}

impl UpStreams {
    pub fn none() -> UpStreams {
        UpStreams::new(Vec::new(), Vec::new())
    }
}

/// Values flowing along [Stream] edges are constrained by this trait. For
/// large structs you'd rather not clone on every peek, wrap them in an
/// [Rc](std::rc::Rc) so cloning stays cheap.
#[doc(hidden)]
pub trait Element: Debug + Clone + Default + 'static {}

impl<T> Element for T where T: Debug + Clone + Default + 'static {}

/// Implement this trait to build your own [Node].
///
/// `cycle` returns `Ok(true)` if the node produced a new value this tick,
/// `Ok(false)` if it had nothing to say, and `Err` if evaluation failed —
/// which terminates the run (see the engine's error handling design).
pub trait MutableNode {
    /// Called by the graph when it determines that this node is due to be
    /// evaluated this tick.
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool>;

    /// Called by the graph at wiring time.
    fn upstreams(&self) -> UpStreams {
        UpStreams::default()
    }

    /// Called by the graph after wiring and before start.
    #[allow(unused_variables)]
    fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called by the graph after wiring and before the first cycle. Can be
    /// used to request an initial callback via [GraphState::schedule_current_node].
    #[allow(unused_variables)]
    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once after the last cycle. Can be used to release resources.
    #[allow(unused_variables)]
    fn stop(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn teardown(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        Ok(())
    }

    fn type_name(&self) -> String {
        tynm::type_name::<Self>()
    }

    /// See [Node::is_push_source].
    fn is_push_source(&self) -> bool {
        false
    }
}

impl Display for dyn Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.type_name())
    }
}

impl<T> Debug for dyn Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.type_name())
    }
}

/// A wiring point in the graph: the non-`mut` facade the graph holds onto,
/// backed internally by a [RefCell]-wrapped [MutableNode].
pub trait Node: MutableNode {
    fn cycle(&self, state: &mut GraphState) -> anyhow::Result<bool>;
    fn setup(&self, state: &mut GraphState) -> anyhow::Result<()>;
    fn start(&self, state: &mut GraphState) -> anyhow::Result<()>;
    fn stop(&self, state: &mut GraphState) -> anyhow::Result<()>;
    fn teardown(&self, state: &mut GraphState) -> anyhow::Result<()>;

    /// `true` for push-source nodes: the graph places these at indices
    /// `0..push_source_nodes_end` and drains them separately each tick,
    /// outside the per-node observer callbacks (§4.4).
    fn is_push_source(&self) -> bool {
        false
    }
}

/// A reference to a [Stream]'s current value can be peeked at through this
/// trait, implemented by the concrete node, not the `Rc<dyn Stream<T>>` facade.
pub trait StreamPeekRef<T>: MutableNode {
    fn peek_ref(&self) -> &T;
}

/// The trait through which a [Stream]'s current value can be peeked at.
pub trait StreamPeek<T> {
    fn peek_value(&self) -> T;
    fn peek_ref_cell(&self) -> std::cell::Ref<'_, T>;
}

/// A [Node] which holds some state that can be peeked at.
pub trait Stream<T>: Node + StreamPeek<T> + AsNode {}

// RefCell blanket impls: every MutableNode becomes a Node once wrapped.

impl<NODE: MutableNode> Node for RefCell<NODE> {
    fn cycle(&self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.borrow_mut().cycle(state)
    }
    fn setup(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().setup(state)
    }
    fn start(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().start(state)
    }
    fn stop(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().stop(state)
    }
    fn teardown(&self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().teardown(state)
    }
    fn is_push_source(&self) -> bool {
        self.borrow().is_push_source()
    }
}

impl<NODE: MutableNode> MutableNode for RefCell<NODE> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.borrow_mut().cycle(state)
    }
    fn upstreams(&self) -> UpStreams {
        self.borrow().upstreams()
    }
    fn setup(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().setup(state)
    }
    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().start(state)
    }
    fn stop(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().stop(state)
    }
    fn teardown(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        self.borrow_mut().teardown(state)
    }
}

impl<STREAM, T> StreamPeek<T> for RefCell<STREAM>
where
    STREAM: StreamPeekRef<T>,
    T: Clone,
{
    fn peek_ref_cell(&self) -> std::cell::Ref<'_, T> {
        std::cell::Ref::map(self.borrow(), |strm| strm.peek_ref())
    }
    fn peek_value(&self) -> T {
        self.peek_ref_cell().clone()
    }
}

impl<STREAM, T> Stream<T> for RefCell<STREAM>
where
    STREAM: StreamPeekRef<T> + 'static,
    T: Clone + 'static,
{
}

/// Used to cast `Rc<dyn Stream<T>>` up to `Rc<dyn Node>`.
pub trait AsNode {
    fn as_node(self: Rc<Self>) -> Rc<dyn Node>;
}

impl<NODE: Node + 'static> AsNode for NODE {
    fn as_node(self: Rc<Self>) -> Rc<dyn Node> {
        self
    }
}

/// Used to cast an `Rc` of a concrete stream into `Rc<dyn Stream<T>>`.
pub trait AsStream<T> {
    fn as_stream(self: Rc<Self>) -> Rc<dyn Stream<T>>;
}

impl<T, STREAM: Stream<T> + 'static> AsStream<T> for STREAM {
    fn as_stream(self: Rc<Self>) -> Rc<dyn Stream<T>> {
        self
    }
}

/// Consumes a concrete [MutableNode] and returns an `Rc<dyn Node>`.
pub trait IntoNode {
    fn into_node(self) -> Rc<dyn Node>;
}

impl<NODE: MutableNode + 'static> IntoNode for NODE {
    fn into_node(self) -> Rc<dyn Node> {
        Rc::new(RefCell::new(self))
    }
}

/// Consumes a concrete [Stream]-capable node and returns an `Rc<dyn Stream<T>>`.
pub trait IntoStream<T> {
    fn into_stream(self) -> Rc<dyn Stream<T>>;
}

impl<T, STREAM> IntoStream<T> for STREAM
where
    T: Clone + 'static,
    STREAM: StreamPeekRef<T> + 'static,
{
    fn into_stream(self) -> Rc<dyn Stream<T>> {
        Rc::new(RefCell::new(self))
    }
}
