use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Only propagates its source when the value actually changes. Used by
/// [distinct](crate::nodes::StreamOperators::distinct).
#[derive(new)]
pub(crate) struct DistinctStream<T: Element> {
    source: Rc<dyn Stream<T>>,
    #[new(default)]
    value: T,
}

impl<T: Element + PartialEq> MutableNode for DistinctStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        let curr = self.source.peek_value();
        if self.value == curr {
            Ok(false)
        } else {
            self.value = curr;
            Ok(true)
        }
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }
}

impl<T: Element + PartialEq> StreamPeekRef<T> for DistinctStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::{NodeOperators, StreamOperators};

    #[test]
    fn distinct_suppresses_repeats() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let clamped = count.map(|x| x.min(2));
        let distinct = clamped.distinct();
        let changes = distinct.count();
        changes
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(5))
            .unwrap();
        // clamped ticks 1,2,2,2,2 -> distinct only lets 1,2 through
        assert_eq!(changes.peek_value(), 2);
    }
}
