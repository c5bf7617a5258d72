use std::rc::Rc;

use crate::queue::ValueAt;
use crate::types::*;

/// Wraps an iterator of time-tagged values and exposes it as a [Stream]
/// (§4.2 "Generator node"). Unlike [CallBackStream](crate::nodes::CallBackStream),
/// whose values are pushed in from outside the graph, a generator's source
/// is supplied once, up front, and pulled lazily as the engine clock
/// reaches each value's time. The source must be non-descending in time.
pub(crate) struct GeneratorStream<T: Element> {
    source: Box<dyn Iterator<Item = ValueAt<T>>>,
    next: Option<ValueAt<T>>,
    value: T,
}

impl<T: Element> GeneratorStream<T> {
    fn new(mut source: Box<dyn Iterator<Item = ValueAt<T>>>) -> Self {
        let next = source.next();
        Self {
            source,
            next,
            value: T::default(),
        }
    }
}

impl<T: Element> MutableNode for GeneratorStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        let now = state.time();
        let mut ticked = false;
        while matches!(&self.next, Some(v) if v.time <= now) {
            self.value = self.next.take().unwrap().value;
            self.next = self.source.next();
            ticked = true;
        }
        if let Some(v) = &self.next {
            state.schedule_current_node(v.time);
        }
        Ok(ticked)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        if let Some(v) = &self.next {
            state.schedule_current_node(v.time);
        }
        Ok(())
    }
}

impl<T: Element> StreamPeekRef<T> for GeneratorStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

/// Builds a [Stream] from a pre-built iterator of time-tagged values
/// (§4.2 "Generator node"): each pair is applied as the engine clock
/// reaches its time, and several due pairs are applied in the same cycle,
/// keeping only the last.
pub fn generator<T: Element>(source: Box<dyn Iterator<Item = ValueAt<T>>>) -> Rc<dyn Stream<T>> {
    GeneratorStream::new(source).into_stream()
}
