use crate::queue::ValueAt;
use crate::types::*;
use std::rc::Rc;

/// Accumulates every value its upstream produces, tagged with the engine
/// time it ticked at. Useful for asserting exact tick sequences in tests.
/// Used by [collect](crate::nodes::StreamOperators::collect).
pub(crate) struct CollectStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    value: Vec<ValueAt<T>>,
}

impl<T: Element> CollectStream<T> {
    pub fn new(upstream: Rc<dyn Stream<T>>) -> Self {
        Self {
            upstream,
            value: Vec::new(),
        }
    }
}

impl<T: Element> MutableNode for CollectStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.value.push(ValueAt::new(self.upstream.peek_value(), state.time()));
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element> StreamPeekRef<Vec<ValueAt<T>>> for CollectStream<T> {
    fn peek_ref(&self) -> &Vec<ValueAt<T>> {
        &self.value
    }
}
