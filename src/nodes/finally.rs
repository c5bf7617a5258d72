use crate::types::*;
use derive_new::new;
use std::rc::Rc;

/// Propagates its source unchanged, running `finally` once, on graph stop,
/// with the last value seen. Used by
/// [finally](crate::nodes::StreamOperators::finally).
#[derive(new)]
pub(crate) struct FinallyNode<T: Element, F: FnOnce(T, &GraphState) + Clone> {
    source: Rc<dyn Stream<T>>,
    finally: F,
    #[new(default)]
    value: T,
}

impl<T: Element, F: FnOnce(T, &GraphState) + Clone> MutableNode for FinallyNode<T, F> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.value = self.source.peek_value();
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.source.clone().as_node()], vec![])
    }

    fn stop(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        (self.finally.clone())(self.value.clone(), state);
        Ok(())
    }
}

impl<T: Element, F: FnOnce(T, &GraphState) + Clone> StreamPeekRef<T> for FinallyNode<T, F> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
