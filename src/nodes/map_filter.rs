use derive_new::new;
use std::rc::Rc;

use crate::types::*;

/// Maps and filters its source in one pass: the closure returns the mapped
/// value together with whether it should tick. Used by
/// [map_filter](crate::nodes::StreamOperators::map_filter).
#[derive(new)]
pub(crate) struct MapFilterStream<IN, OUT: Element> {
    upstream: Rc<dyn Stream<IN>>,
    #[new(default)]
    value: OUT,
    func: Box<dyn Fn(IN) -> (OUT, bool)>,
}

impl<IN, OUT: Element> MutableNode for MapFilterStream<IN, OUT> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        let (val, ticked) = (self.func)(self.upstream.peek_value());
        if ticked {
            self.value = val;
        }
        Ok(ticked)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<IN: 'static, OUT: Element> StreamPeekRef<OUT> for MapFilterStream<IN, OUT> {
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
    fn map_filter_drops_values_the_closure_rejects() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let evens = count.map_filter(|x| (x, x % 2 == 0));
        evens
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .unwrap();
        assert_eq!(evens.peek_value(), 4);
    }
}
