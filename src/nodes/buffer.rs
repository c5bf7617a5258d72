use crate::types::*;

use std::rc::Rc;

/// Batches its source into fixed-size chunks, flushing early on the last
/// cycle of a bounded run so no trailing partial batch is lost. Used by
/// [buffer](crate::nodes::StreamOperators::buffer).
pub(crate) struct BufferStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    capacity: usize,
    buffer: Vec<T>,
    value: Vec<T>,
}

impl<T: Element> BufferStream<T> {
    pub fn new(upstream: Rc<dyn Stream<T>>, capacity: usize) -> Self {
        Self {
            upstream,
            capacity,
            buffer: Vec::with_capacity(capacity),
            value: Vec::new(),
        }
    }
}

impl<T: Element> MutableNode for BufferStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.buffer.push(self.upstream.peek_value());
        if self.buffer.len() >= self.capacity || (!self.buffer.is_empty() && state.is_last_cycle()) {
            self.value = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element> StreamPeekRef<Vec<T>> for BufferStream<T> {
    fn peek_ref(&self) -> &Vec<T> {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::{NodeOperators, StreamOperators};

    #[test]
    fn buffer_flushes_at_capacity() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let buffer = count.buffer(2);
        buffer
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .unwrap();
        assert_eq!(buffer.peek_value(), vec![3, 4]);
    }

    #[test]
    fn buffer_flushes_partial_batch_on_last_cycle() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let buffer = count.buffer(10);
        buffer
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(3))
            .unwrap();
        assert_eq!(buffer.peek_value(), vec![1, 2, 3]);
    }
}
