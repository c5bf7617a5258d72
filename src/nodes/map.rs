use derive_new::new;
use std::rc::Rc;

use crate::types::*;

/// Maps its upstream into a new [Stream] with the supplied closure. Ticks
/// whenever the upstream ticks. Used by [map](crate::nodes::StreamOperators::map).
#[derive(new)]
pub(crate) struct MapStream<IN, OUT: Element> {
    upstream: Rc<dyn Stream<IN>>,
    #[new(default)]
    value: OUT,
    func: Box<dyn Fn(IN) -> OUT>,
}

impl<IN, OUT: Element> MutableNode for MapStream<IN, OUT> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = (self.func)(self.upstream.peek_value());
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<IN: 'static, OUT: Element> StreamPeekRef<OUT> for MapStream<IN, OUT> {
    fn peek_ref(&self) -> &OUT {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::{NodeOperators, StreamOperators};

    #[test]
    fn map_applies_func_on_each_tick() {
        let source = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let mapped = source.map(|x| x * 10);
        mapped
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(3))
            .unwrap();
        assert_eq!(mapped.peek_value(), 30);
    }
}
