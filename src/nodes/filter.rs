use derive_new::new;
use std::rc::Rc;

use crate::types::*;

/// Passes its source through unchanged whenever `condition` ticks `true`
/// this cycle. Used by [filter](crate::nodes::StreamOperators::filter).
#[derive(new)]
pub(crate) struct FilterStream<T: Element> {
    source: Rc<dyn Stream<T>>,
    condition: Rc<dyn Stream<bool>>,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for FilterStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        // Gate on the source being valid (having ever ticked), not just on
        // the condition, so a condition ticking `true` before the source's
        // first value doesn't propagate `T::default()` as a spurious fire.
        let ticked = self.condition.peek_value() && state.has_ticked(self.source.clone().as_node());
        if ticked {
            self.value = self.source.peek_value();
        }
        Ok(ticked)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(
            vec![self.source.clone().as_node(), self.condition.clone().as_node()],
            vec![],
        )
    }
}

impl<T: Element> StreamPeekRef<T> for FilterStream<T> {
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
    fn filter_only_ticks_when_condition_true() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let even = count.clone().map(|x| x % 2 == 0);
        let evens = count.filter(even);
        evens
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .unwrap();
        assert_eq!(evens.peek_value(), 4);
    }

    #[test]
    fn filter_does_not_fire_before_source_has_ever_ticked() {
        use crate::nodes::CallBackStream;
        use crate::queue::ValueAt;
        use std::cell::RefCell;
        use std::rc::Rc;

        let condition = Rc::new(RefCell::new(CallBackStream::<bool>::new()));
        condition.borrow_mut().push(ValueAt::new(true, NanoTime::ZERO));
        let source = Rc::new(RefCell::new(CallBackStream::<i64>::new()));
        source.borrow_mut().push(ValueAt::new(42, NanoTime::new(50)));

        let filtered = FilterStream::new(source.clone(), condition.clone()).into_stream();
        filtered
            .clone()
            .as_node()
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(1))
            .unwrap();
        assert_eq!(filtered.peek_value(), 0, "must not fire before source has ticked");
    }
}
