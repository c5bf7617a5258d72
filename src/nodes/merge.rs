use crate::types::*;
use derive_new::new;

use std::rc::Rc;

/// Ticks whenever any upstream ticks, propagating whichever one fired. If
/// more than one upstream ticks on the same cycle, the first (in
/// declaration order) wins. Used by [merge](crate::nodes::merge).
#[derive(new)]
pub(crate) struct MergeStream<T: Element> {
    upstreams: Vec<Rc<dyn Stream<T>>>,
    #[new(default)]
    value: T,
}

impl<T: Element> MutableNode for MergeStream<T> {
    fn cycle(&mut self, state: &mut GraphState) -> anyhow::Result<bool> {
        for stream in self.upstreams.iter() {
            if state.ticked(stream.clone().as_node()) {
                self.value = stream.peek_value();
                break;
            }
        }
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(
            self.upstreams.iter().map(|stream| stream.clone().as_node()).collect(),
            vec![],
        )
    }
}

impl<T: Element> StreamPeekRef<T> for MergeStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}
