//! A library of ready-made [Node]/[Stream] kinds and the [NodeOperators]/
//! [StreamOperators] traits that chain them together.

mod average;
mod buffer;
mod callback;
mod collect;
mod combine;
mod constant;
mod consumer;
mod difference;
mod distinct;
mod filter;
mod finally;
mod fold;
mod generator;
mod graph_state;
mod logged;
mod map;
mod map_filter;
mod merge;
mod print;
mod producer;
mod push_source;
mod sample;
mod tick;

pub use callback::CallBackStream;
pub use generator::generator;
pub use push_source::{PushSourceHandle, push_source};

use average::*;
use buffer::BufferStream;
use collect::CollectStream;
use constant::*;
use consumer::*;
use difference::*;
use distinct::*;
use filter::*;
use finally::*;
use fold::*;
use graph_state::*;
use logged::LoggedStream;
use map::*;
use map_filter::*;
use merge::*;
use print::*;
use producer::*;
use sample::*;
use tick::TickNode;

use crate::graph::*;
use crate::queue::ValueAt;
use crate::types::*;

use log::Level;
use num_traits::ToPrimitive;
use std::ops::Add;
use std::rc::Rc;
use std::time::Duration;
use tinyvec::TinyVec;

/// A [Stream] that ticks once, with `value`, on the graph's first cycle.
pub fn constant<T: Element>(value: T) -> Rc<dyn Stream<T>> {
    ConstantStream::new(value).into_stream()
}

/// Merges several streams of the same type into one, ticking whenever any
/// of them ticks. If more than one ticks on the same cycle, the first one
/// supplied wins.
pub fn merge<T: Element>(sources: Vec<Rc<dyn Stream<T>>>) -> Rc<dyn Stream<T>> {
    MergeStream::new(sources).into_stream()
}

/// Collects a `Vec` of streams into one `Stream` of `TinyVec`, one entry
/// per stream that ticked this cycle.
pub fn combine<T: Element>(streams: Vec<Rc<dyn Stream<T>>>) -> Rc<dyn Stream<TinyVec<[T; 1]>>> {
    combine::combine(streams)
}

/// A [Node] that ticks with the given period.
pub fn ticker(period: Duration) -> Rc<dyn Node> {
    TickNode::new(NanoTime::new(period.as_nanos() as u64)).into_node()
}

/// A [Node] that ticks on every representable engine instant.
pub fn always() -> Rc<dyn Node> {
    TickNode::new(NanoTime::ZERO).into_node()
}

/// Operators that can be applied to any [Node]. Implemented for `dyn Node`
/// and, via delegation through [AsNode], for `dyn Stream<T>`.
pub trait NodeOperators {
    /// Running count of the number of times the node ticks.
    /// ```
    /// # use timegraph::*;
    /// # use std::time::Duration;
    /// ticker(Duration::from_millis(10)).count(); // 1, 2, 3, ...
    /// ```
    fn count(self: &Rc<Self>) -> Rc<dyn Stream<u64>>;

    /// Emits the engine time of each tick.
    fn ticked_at(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>>;

    /// Emits the engine time of each tick, relative to the run's start.
    fn ticked_at_elapsed(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>>;

    /// Emits the result of `func` on every tick, ignoring the node's own
    /// value.
    fn produce<T: Element>(self: &Rc<Self>, func: impl Fn() -> T + 'static) -> Rc<dyn Stream<T>>;

    /// Shortcut for building and running a [Graph] rooted at this node.
    /// ```
    /// # use timegraph::*;
    /// # use std::time::Duration;
    /// let count = ticker(Duration::from_millis(1)).count();
    /// count.run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(3)).unwrap();
    /// assert_eq!(count.peek_value(), 3);
    /// ```
    fn run(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()>;

    /// Builds, but does not run, a [Graph] rooted at this node.
    fn into_graph(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> Graph;
}

impl NodeOperators for dyn Node {
    fn count(self: &Rc<Self>) -> Rc<dyn Stream<u64>> {
        constant(1u64).sample(self.clone()).sum()
    }

    fn ticked_at(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        let f = Box::new(|state: &mut GraphState| state.time());
        GraphStateStream::new(self.clone(), f).into_stream()
    }

    fn ticked_at_elapsed(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        let f = Box::new(|state: &mut GraphState| state.elapsed());
        GraphStateStream::new(self.clone(), f).into_stream()
    }

    fn produce<T: Element>(self: &Rc<Self>, func: impl Fn() -> T + 'static) -> Rc<dyn Stream<T>> {
        ProducerStream::new(self.clone(), Box::new(func)).into_stream()
    }

    fn run(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()> {
        Graph::new(vec![self.clone()], run_mode, run_for).run()
    }

    fn into_graph(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> Graph {
        Graph::new(vec![self.clone()], run_mode, run_for)
    }
}

impl<T> NodeOperators for dyn Stream<T> {
    fn count(self: &Rc<Self>) -> Rc<dyn Stream<u64>> {
        self.clone().as_node().count()
    }
    fn ticked_at(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        self.clone().as_node().ticked_at()
    }
    fn ticked_at_elapsed(self: &Rc<Self>) -> Rc<dyn Stream<NanoTime>> {
        self.clone().as_node().ticked_at_elapsed()
    }
    fn produce<OUT: Element>(self: &Rc<Self>, func: impl Fn() -> OUT + 'static) -> Rc<dyn Stream<OUT>> {
        self.clone().as_node().produce(func)
    }
    fn run(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> anyhow::Result<()> {
        self.clone().as_node().run(run_mode, run_for)
    }
    fn into_graph(self: &Rc<Self>, run_mode: RunMode, run_for: RunFor) -> Graph {
        self.clone().as_node().into_graph(run_mode, run_for)
    }
}

/// Operators that can be applied to a typed [Stream]. Used to support
/// method-chaining syntax.
pub trait StreamOperators<T: Element> {
    fn accumulate(self: &Rc<Self>) -> Rc<dyn Stream<Vec<T>>>;
    fn average(self: &Rc<Self>) -> Rc<dyn Stream<f64>>
    where
        T: ToPrimitive;
    /// Batches source values, flushing at `capacity` and, if the run has a
    /// bounded cycle count, also on the final cycle.
    fn buffer(self: &Rc<Self>, capacity: usize) -> Rc<dyn Stream<Vec<T>>>;
    /// Accumulates every value this stream ticks, tagged with its time.
    /// Useful for asserting exact tick sequences in tests.
    fn collect(self: &Rc<Self>) -> Rc<dyn Stream<Vec<ValueAt<T>>>>;
    fn difference(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: std::ops::Sub<Output = T>;
    fn distinct(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: PartialEq;
    /// Passes the source through whenever `condition` is currently `true`.
    fn filter(self: &Rc<Self>, condition: Rc<dyn Stream<bool>>) -> Rc<dyn Stream<T>>;
    /// Passes the source through whenever `predicate` holds for its value.
    fn filter_value(self: &Rc<Self>, predicate: impl Fn(&T) -> bool + 'static) -> Rc<dyn Stream<T>>;
    fn finally<F: FnOnce(T, &GraphState) + Clone + 'static>(self: &Rc<Self>, func: F) -> Rc<dyn Node>;
    fn for_each(self: &Rc<Self>, func: impl Fn(T, NanoTime) + 'static) -> Rc<dyn Node>;
    fn fold<OUT: Element>(self: &Rc<Self>, func: impl Fn(&mut OUT, T) + 'static) -> Rc<dyn Stream<OUT>>;
    /// Maps a `(OUT, bool)`-returning closure over the source, ticking only
    /// when the closure returns `true`.
    fn map_filter<OUT: Element>(self: &Rc<Self>, func: impl Fn(T) -> (OUT, bool) + 'static) -> Rc<dyn Stream<OUT>>;
    /// Logs the source's value through [GraphState::log] and propagates it
    /// unchanged.
    fn logged(self: &Rc<Self>, label: &str, level: Level) -> Rc<dyn Stream<T>>;
    fn map<OUT: Element>(self: &Rc<Self>, func: impl Fn(T) -> OUT + 'static) -> Rc<dyn Stream<OUT>>;
    fn not(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: std::ops::Not<Output = T>;
    fn print(self: &Rc<Self>) -> Rc<dyn Stream<T>>;
    fn reduce(self: &Rc<Self>, func: impl Fn(T, T) -> T + 'static) -> Rc<dyn Stream<T>>;
    /// Emits the source's current value whenever `trigger` ticks.
    fn sample(self: &Rc<Self>, trigger: Rc<dyn Node>) -> Rc<dyn Stream<T>>;
    fn sum(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: Add<T, Output = T>;
}

impl<T: Element> StreamOperators<T> for dyn Stream<T> {
    fn accumulate(self: &Rc<Self>) -> Rc<dyn Stream<Vec<T>>> {
        self.fold(|acc: &mut Vec<T>, value| acc.push(value))
    }

    fn average(self: &Rc<Self>) -> Rc<dyn Stream<f64>>
    where
        T: ToPrimitive,
    {
        AverageStream::new(self.clone()).into_stream()
    }

    fn buffer(self: &Rc<Self>, capacity: usize) -> Rc<dyn Stream<Vec<T>>> {
        BufferStream::new(self.clone(), capacity).into_stream()
    }

    fn collect(self: &Rc<Self>) -> Rc<dyn Stream<Vec<ValueAt<T>>>> {
        CollectStream::new(self.clone()).into_stream()
    }

    fn difference(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: std::ops::Sub<Output = T>,
    {
        DifferenceStream::new(self.clone()).into_stream()
    }

    fn distinct(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: PartialEq,
    {
        DistinctStream::new(self.clone()).into_stream()
    }

    fn filter(self: &Rc<Self>, condition: Rc<dyn Stream<bool>>) -> Rc<dyn Stream<T>> {
        FilterStream::new(self.clone(), condition).into_stream()
    }

    fn filter_value(self: &Rc<Self>, predicate: impl Fn(&T) -> bool + 'static) -> Rc<dyn Stream<T>> {
        let condition = self.clone().map(move |val| predicate(&val));
        FilterStream::new(self.clone(), condition).into_stream()
    }

    fn finally<F: FnOnce(T, &GraphState) + Clone + 'static>(self: &Rc<Self>, func: F) -> Rc<dyn Node> {
        FinallyNode::new(self.clone(), func).into_node()
    }

    fn for_each(self: &Rc<Self>, func: impl Fn(T, NanoTime) + 'static) -> Rc<dyn Node> {
        ConsumerNode::new(self.clone(), Box::new(func)).into_node()
    }

    fn fold<OUT: Element>(self: &Rc<Self>, func: impl Fn(&mut OUT, T) + 'static) -> Rc<dyn Stream<OUT>> {
        FoldStream::new(self.clone(), Box::new(func)).into_stream()
    }

    fn map_filter<OUT: Element>(self: &Rc<Self>, func: impl Fn(T) -> (OUT, bool) + 'static) -> Rc<dyn Stream<OUT>> {
        MapFilterStream::new(self.clone(), Box::new(func)).into_stream()
    }

    fn logged(self: &Rc<Self>, label: &str, level: Level) -> Rc<dyn Stream<T>> {
        if log::log_enabled!(level) {
            LoggedStream::new(self.clone(), label, level).into_stream()
        } else {
            self.clone()
        }
    }

    fn map<OUT: Element>(self: &Rc<Self>, func: impl Fn(T) -> OUT + 'static) -> Rc<dyn Stream<OUT>> {
        MapStream::new(self.clone(), Box::new(func)).into_stream()
    }

    fn not(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: std::ops::Not<Output = T>,
    {
        self.map(|value| !value)
    }

    fn print(self: &Rc<Self>) -> Rc<dyn Stream<T>> {
        PrintStream::new(self.clone()).into_stream()
    }

    fn reduce(self: &Rc<Self>, func: impl Fn(T, T) -> T + 'static) -> Rc<dyn Stream<T>> {
        let f = move |acc: &mut T, val: T| *acc = func((*acc).clone(), val);
        self.fold(f)
    }

    fn sample(self: &Rc<Self>, trigger: Rc<dyn Node>) -> Rc<dyn Stream<T>> {
        SampleStream::new(self.clone(), trigger).into_stream()
    }

    fn sum(self: &Rc<Self>) -> Rc<dyn Stream<T>>
    where
        T: Add<T, Output = T>,
    {
        self.reduce(|acc, val| acc + val)
    }
}
