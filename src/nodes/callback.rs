use crate::types::*;
use crate::queue::ValueAt;

/// A [Stream] fed by calling [push](CallBackStream::push) from outside the
/// graph, useful for driving deterministic unit tests. Not a push source in
/// the §4.4 sense: values are queued ahead of time and drained as the
/// engine's own clock reaches their timestamp, so this only makes sense in
/// back-test mode.
pub struct CallBackStream<T: Element> {
    value: T,
    pending: Vec<ValueAt<T>>,
}

impl<T: Element> Default for CallBackStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> CallBackStream<T> {
    pub fn new() -> Self {
        Self {
            value: T::default(),
            pending: Vec::new(),
        }
    }

    /// Queues `value` to be emitted once the engine clock reaches its time.
    /// Keeps `pending` sorted ascending by time so `cycle` can drain from
    /// the front.
    pub fn push(&mut self, value: ValueAt<T>) {
        let ix = self.pending.partition_point(|v| v.time <= value.time);
        self.pending.insert(ix, value);
    }

    fn next_time(&self) -> Option<NanoTime> {
        self.pending.first().map(|v| v.time)
    }
}

impl<T: Element> MutableNode for CallBackStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        let now = state.time();
        let mut ticked = false;
        while matches!(self.next_time(), Some(t) if t == now) {
            self.value = self.pending.remove(0).value;
            ticked = true;
        }
        if let Some(next) = self.next_time() {
            state.schedule_current_node(next);
        }
        Ok(ticked)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        if let Some(next) = self.next_time() {
            state.schedule_current_node(next);
        }
        Ok(())
    }
}

impl<T: Element> StreamPeekRef<T> for CallBackStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::NodeOperators;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn pushed_values_are_emitted_at_their_scheduled_time() {
        let input: Rc<RefCell<CallBackStream<u64>>> = Rc::new(RefCell::new(CallBackStream::new()));
        input.borrow_mut().push(ValueAt::new(1, NanoTime::new(100)));
        input.borrow_mut().push(ValueAt::new(2, NanoTime::new(200)));
        let node: Rc<dyn Node> = input.clone();
        assert_eq!(input.peek_value(), 0);
        node.run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(2))
            .unwrap();
        assert_eq!(input.peek_value(), 2);
    }
}
