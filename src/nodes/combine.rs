use crate::types::*;
use derive_new::new;

use std::cell::RefCell;
use std::rc::Rc;
use tinyvec::TinyVec;

/// Stashes its upstream's value into a shared buffer every cycle; paired
/// one-to-one with a [CombineStream] that drains the buffer. Used by
/// [combine](crate::nodes::combine).
#[derive(new)]
struct CombineNode<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    combined: Rc<RefCell<TinyVec<[T; 1]>>>,
}

impl<T: Element> MutableNode for CombineNode<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.combined.borrow_mut().push(self.upstream.peek_value());
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

/// Drains the shared buffer every cycle, emitting every value its sibling
/// [CombineNode]s collected this tick.
#[derive(new)]
struct CombineStream<T: Element> {
    upstreams: Vec<Rc<dyn Node>>,
    combined: Rc<RefCell<TinyVec<[T; 1]>>>,
    #[new(default)]
    value: TinyVec<[T; 1]>,
}

impl<T: Element> MutableNode for CombineStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = std::mem::take(&mut *self.combined.borrow_mut());
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(self.upstreams.clone(), vec![])
    }
}

impl<T: Element> StreamPeekRef<TinyVec<[T; 1]>> for CombineStream<T> {
    fn peek_ref(&self) -> &TinyVec<[T; 1]> {
        &self.value
    }
}

/// Combines several streams of the same type into one, emitting a vector of
/// every value that ticked across all of them this cycle.
pub fn combine<T: Element>(streams: Vec<Rc<dyn Stream<T>>>) -> Rc<dyn Stream<TinyVec<[T; 1]>>> {
    let combined = Rc::new(RefCell::new(TinyVec::new()));
    let nodes: Vec<Rc<dyn Node>> = streams
        .iter()
        .map(|stream| CombineNode::new(stream.clone(), combined.clone()).into_node())
        .collect();
    CombineStream::new(nodes, combined).into_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::{NodeOperators, StreamOperators};
    use tinyvec::tiny_vec;

    #[test]
    fn combine_gathers_every_upstream_tick() {
        let src = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let streams: Vec<Rc<dyn Stream<u64>>> = (0..3).map(|i| src.map(move |x| x * 10_u64.pow(i))).collect();
        let combined = combine(streams);
        combined
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(1))
            .unwrap();
        assert_eq!(combined.peek_value(), tiny_vec![1, 10, 100]);
    }
}
