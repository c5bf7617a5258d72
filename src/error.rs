use crate::time::NanoTime;
use thiserror::Error;

/// The finite set of failure kinds the engine itself can raise, as opposed
/// to arbitrary failures surfacing from a node's own `eval_fn`/`start_fn`/
/// `stop_fn` (those are carried as `anyhow::Error`, see [`crate::graph::Graph::run`]).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("end_time {end_time} is before start_time {start_time}")]
    InvalidTimeRange {
        start_time: NanoTime,
        end_time: NanoTime,
    },

    #[error("push source node {node_index} cannot be used in back-test mode")]
    PushSourceInBackTest { node_index: usize },

    #[error("node {node_index} is already started")]
    AlreadyStarted { node_index: usize },

    #[error("a GraphBuilderFactory is already declared")]
    AlreadyDeclared,

    #[error("node {node_index} eval failed: {source}")]
    NodeEvalFailed {
        node_index: usize,
        #[source]
        source: anyhow::Error,
    },
}
