use crate::types::*;

use derive_new::new;

use std::rc::Rc;

/// Accumulates its source into `OUT` with the supplied closure, ticking on
/// every upstream tick. Used by [fold](crate::nodes::StreamOperators::fold).
#[derive(new)]
pub(crate) struct FoldStream<IN: Element, OUT: Element> {
    upstream: Rc<dyn Stream<IN>>,
    func: Box<dyn Fn(&mut OUT, IN)>,
    #[new(default)]
    value: OUT,
}

impl<IN: Element, OUT: Element> MutableNode for FoldStream<IN, OUT> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        (self.func)(&mut self.value, self.upstream.peek_value());
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<IN: Element, OUT: Element> StreamPeekRef<OUT> for FoldStream<IN, OUT> {
    fn peek_ref(&self) -> &OUT {
        &self.value
    }
}
