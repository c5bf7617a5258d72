use crate::types::*;
use derive_new::new;

/// Ticks once, with `value`, on the graph's first cycle.
#[derive(new)]
pub(crate) struct ConstantStream<T: Element> {
    value: T,
}

impl<T: Element> MutableNode for ConstantStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        state.schedule_current_node(state.start_time());
        Ok(())
    }
}

impl<T: Element> StreamPeekRef<T> for ConstantStream<T> {
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
    fn constant_value_ticks_once() {
        let x = 7;
        let const_value = ConstantStream::new(x).into_stream();
        assert_eq!(const_value.peek_value(), x);
        const_value
            .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(1))
            .unwrap();
        assert_eq!(const_value.peek_value(), x);
    }
}
