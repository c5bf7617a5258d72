use derive_new::new;

use std::ops::Sub;
use std::rc::Rc;

use crate::types::*;

/// Emits the difference between its source's current and previous value.
/// Does not tick on the upstream's first value, since there is no previous
/// value to subtract from it yet. Used by
/// [difference](crate::nodes::StreamOperators::difference).
#[derive(new)]
pub(crate) struct DifferenceStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    #[new(default)]
    diff: T,
    #[new(default)]
    prev_val: Option<T>,
}

impl<T: Element + Sub<Output = T>> MutableNode for DifferenceStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        let curr = self.upstream.peek_value();
        let ticked = match self.prev_val.clone() {
            Some(prev) => {
                self.diff = curr.clone() - prev;
                true
            }
            None => false,
        };
        self.prev_val = Some(curr);
        Ok(ticked)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element + Sub<Output = T>> StreamPeekRef<T> for DifferenceStream<T> {
    fn peek_ref(&self) -> &T {
        &self.diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::{NodeOperators, StreamOperators};

    #[test]
    fn difference_skips_the_first_tick() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let diff = count.difference();
        let ticks = diff.count();
        ticks
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .unwrap();
        assert_eq!(ticks.peek_value(), 3);
        assert_eq!(diff.peek_value(), 1);
    }
}
