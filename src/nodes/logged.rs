use crate::types::*;
use log::Level;
use std::rc::Rc;

/// Propagates its upstream unchanged, logging each value through
/// [GraphState::log] at `level` under `label`. Used by
/// [logged](crate::nodes::StreamOperators::logged).
pub(crate) struct LoggedStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    label: String,
    level: Level,
    value: T,
}

impl<T: Element> LoggedStream<T> {
    pub fn new(upstream: Rc<dyn Stream<T>>, label: &str, level: Level) -> Self {
        Self {
            upstream,
            label: label.to_string(),
            level,
            value: T::default(),
        }
    }
}

impl<T: Element> MutableNode for LoggedStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = self.upstream.peek_value();
        state.log(self.level, &format!("{} {:?}", self.label, self.value));
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element> StreamPeekRef<T> for LoggedStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
