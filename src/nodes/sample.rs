use derive_new::new;

use crate::types::*;
use std::rc::Rc;

/// Emits its source's current value, but only ticks when `trigger` ticks.
/// Used by [sample](crate::nodes::StreamOperators::sample).
#[derive(new)]
pub(crate) struct SampleStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    trigger: Rc<dyn Node>,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for SampleStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = self.upstream.peek_value();
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        // only ticks on trigger; the upstream is read but must not itself
        // wake this node
        UpStreams::new(vec![self.trigger.clone()], vec![self.upstream.clone().as_node()])
    }
}

impl<T: Element> StreamPeekRef<T> for SampleStream<T> {
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
    fn sample_only_ticks_on_trigger() {
        let src = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let trigger = crate::nodes::tick::TickNode::new(NanoTime::new(350)).into_node();
        let sampled = src.sample(trigger);
        let ticks = sampled.count();
        ticks
            .run(
                RunMode::BackTestFrom(NanoTime::ZERO),
                RunFor::Duration(std::time::Duration::from_nanos(1000)),
            )
            .unwrap();
        assert_eq!(ticks.peek_value(), 2);
    }
}
