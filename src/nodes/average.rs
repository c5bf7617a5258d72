use crate::types::*;

use derive_new::new;

use num_traits::ToPrimitive;
use std::rc::Rc;

/// Computes the running average of its source. Used by
/// [average](crate::nodes::StreamOperators::average).
#[derive(new)]
pub(crate) struct AverageStream<T: Element> {
    upstream: Rc<dyn Stream<T>>,
    #[new(default)]
    value: f64,
    #[new(default)]
    count: u64,
}

impl<T: Element + ToPrimitive> MutableNode for AverageStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        self.count += 1;
        let sample = self.upstream.peek_value().to_f64().unwrap_or(f64::NAN);
        self.value += (sample - self.value) / self.count as f64;
        Ok(true)
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::new(vec![self.upstream.clone().as_node()], vec![])
    }
}

impl<T: Element + ToPrimitive> StreamPeekRef<f64> for AverageStream<T> {
    fn peek_ref(&self) -> &f64 {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RunFor, RunMode};
    use crate::nodes::{NodeOperators, StreamOperators};

    #[test]
    fn average_tracks_the_running_mean() {
        let count = crate::nodes::tick::TickNode::new(NanoTime::new(100))
            .into_node()
            .count();
        let avg = count.average();
        avg.run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Cycles(4))
            .unwrap();
        assert_eq!(avg.peek_value(), 2.5);
    }
}
