#![warn(clippy::perf)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_doctest_main)]

//! ## Graph Execution
//!
//! timegraph abstracts away the details of how to co-ordinate the calculation
//! of an application built out of time-series values that tick at different
//! frequencies: you describe the data flow once, and the engine figures out
//! which nodes need cycling on each tick. Only nodes reachable from an active
//! upstream this cycle are evaluated, so the engine scales to large graphs.
//!
//! ```rust
//! use timegraph::*;
//! use std::time::Duration;
//!
//! let period = Duration::from_millis(10);
//! let source = ticker(period).count(); // 1, 2, 3, ...
//! let is_even = source.map(|i| i % 2 == 0);
//! let odds = source.filter(is_even.not()).map(|i| format!("{i} is odd"));
//! let evens = source.filter(is_even).map(|i| format!("{i} is even"));
//! merge(vec![odds, evens])
//!     .print()
//!     .run(RunMode::BackTestFrom(NanoTime::ZERO), RunFor::Duration(period * 4))
//!     .unwrap();
//! ```
//!
//! ## Back-test vs real-time
//!
//! Engine time is nanoseconds from the UNIX epoch, represented by
//! [NanoTime]. [RunMode::BackTestFrom] advances engine time as fast as
//! work permits, replaying history instantaneously; [RunMode::RealTime]
//! tracks the wall clock and can be woken early by a
//! [push source](nodes::push_source) from another thread. The same graph
//! definition runs under either mode unchanged.
//!
//! ## Observability
//!
//! [LifecycleObserver] hooks surface graph and per-node start/stop/evaluate
//! events to external tooling (metrics, tracing) without the nodes
//! themselves knowing about it. [GraphState::log] routes per-node log lines
//! through the `log` facade, tagged with the node's type name and graph id.

#[macro_use]
extern crate log;
extern crate derive_new;

mod builder;
mod channel;
mod context;
mod error;
mod graph;
mod nodes;
mod observer;
mod queue;
mod scheduler;
mod time;
mod types;

pub use builder::*;
pub use channel::PushSender;
pub use context::{ExecutionContext, PushNotifier};
pub use error::EngineError;
pub use graph::*;
pub use nodes::*;
pub use observer::*;
pub use queue::*;
pub use time::*;
pub use types::*;
