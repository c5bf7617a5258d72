use derive_new::new;

use std::rc::Rc;

use crate::types::*;

/// Gives a closure read access to [GraphState] each time `upstream` ticks.
/// Backs [ticked_at](crate::nodes::NodeOperators::ticked_at) and
/// [ticked_at_elapsed](crate::nodes::NodeOperators::ticked_at_elapsed).
#[derive(new)]
pub(crate) struct GraphStateStream<T: Element> {
    upstream: Rc<dyn Node>,
    #[new(default)]
    value: T,
    func: Box<dyn Fn(&mut GraphState) -> T>,
}

impl<T: Element> MutableNode for GraphStateStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = (self.func)(state);
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone()], vec![])
    }
}

impl<T: Element> StreamPeekRef<T> for GraphStateStream<T> {
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
    fn ticked_at_reports_the_current_engine_time() {
        let tick = crate::nodes::tick::TickNode::new(NanoTime::new(100)).into_node();
        let at = tick.ticked_at();
        at.run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(3))
            .unwrap();
        assert_eq!(at.peek_value(), NanoTime::new(200));
    }
}
