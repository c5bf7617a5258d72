use crate::types::*;

/// Ticks with a fixed period, or on every representable instant when the
/// period is zero. Used by [ticker](crate::nodes::ticker) and
/// [always](crate::nodes::always).
pub(crate) struct TickNode {
    period: NanoTime,
}

impl TickNode {
    pub fn new(period: NanoTime) -> Self {
        Self { period }
    }
}

impl MutableNode for TickNode {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        let next = if self.period > NanoTime::ZERO {
            state.time() + self.period
        } else {
            state.time().next_instant()
        };
        state.schedule_current_node(next);
        Ok(true)
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        state.schedule_current_node(state.start_time());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, RunFor, RunMode};
    use crate::nodes::NodeOperators;
    use std::time::Duration;

    #[test]
    fn ticker_fires_at_fixed_period() {
        let count = TickNode::new(NanoTime::new(100)).into_node().count();
        count
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(3))
            .unwrap();
        assert_eq!(count.peek_value(), 3);
    }

    #[test]
    fn zero_period_ticks_every_instant() {
        let count = TickNode::new(NanoTime::ZERO).into_node().count();
        count
            .run(
                RunMode::BackTestFrom(NanoTime::ZERO),
                RunFor::Duration(Duration::from_nanos(0)),
            )
            .unwrap();
        assert_eq!(count.peek_value(), 1);
    }
}
