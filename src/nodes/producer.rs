use derive_new::new;

use std::rc::Rc;

use crate::types::*;

/// Produces a value with the supplied closure each time `upstream` ticks,
/// ignoring `upstream`'s own value. Backs
/// [count](crate::nodes::NodeOperators::count) and
/// [produce](crate::nodes::NodeOperators::produce).
#[derive(new)]
pub(crate) struct ProducerStream<T: Element> {
    upstream: Rc<dyn Node>,
    func: Box<dyn Fn() -> T>,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for ProducerStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = (self.func)();
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone()], vec![])
    }
}

impl<T: Element> StreamPeekRef<T> for ProducerStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::NodeOperators;

    #[test]
    fn count_counts_upstream_ticks() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        count
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(5))
            .unwrap();
        assert_eq!(count.peek_value(), 5);
    }
}
