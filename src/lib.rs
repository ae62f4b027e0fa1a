//! Stagehand: a cooperative, single-thread-per-reactor task runtime with
//! batched waiting and leveled cancellation.
//!
//! # Overview
//!
//! A [`Task`] is a value that is either already resolved (a value or an
//! [`Error`]) or owns a pending operation. Pending operations never poll
//! themselves. Each reactor iteration they *prepare*, registering descriptors,
//! deadlines, or an "already finished" mark in one shared
//! [`PrepareContext`](runtime::PrepareContext). The [`Runner`] then issues a
//! single OS wait over everything that was registered and *finishes* only the
//! operations whose interest fired.
//!
//! Cancellation is cooperative and escalates through four ordered
//! [`CancelLevel`]s (`None < Quit < Abort < Kill`). Every combinator forwards
//! the level to whatever it is waiting on; an operation decides for itself how
//! to react to each level.
//!
//! # Module Structure
//!
//! - [`types`]: Cancel levels and escalation tracking
//! - [`error`](mod@error): Error types
//! - [`task`]: The task value and the pending-operation contract
//! - [`runtime`]: Wait contexts, the poller, the runner, prepared handles
//! - [`combinator`]: Sequential, parallel, loop, and cancellation combinators
//! - [`channel`]: Bounded and unbounded rendezvous queues
//! - [`time`]: Timers and yielding
//! - [`io`]: Tasks over raw descriptors
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```no_run
//! use stagehand::{Runner, Task, time};
//! use std::time::Duration;
//!
//! let runner = Runner::new()?;
//! let task = time::sleep(Duration::from_millis(10)).then(|()| Task::value(42));
//! assert_eq!(runner.run(task)?, 42);
//! # Ok::<(), stagehand::Error>(())
//! ```

// Default to deny for unsafe code - the poll(2) shim opts out with #[allow(unsafe_code)].
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

#[cfg(not(unix))]
compile_error!("stagehand waits on poll(2) descriptors and requires a unix target.");

pub mod channel;
pub mod combinator;
pub mod error;
pub mod io;
pub mod runtime;
pub mod task;
pub mod time;
pub mod tracing_compat;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use channel::Channel;
pub use combinator::{
    Iteration, Step, TaskGroup, cancel_requested, iterate, join, join_all, loop_fn, loop_with,
    race,
};
pub use error::{ConfigError, Error, ErrorKind, Result};
pub use runtime::{
    FinishContext, Interest, Memento, PrepareContext, PreparedTask, Readiness, Runner,
    RunnerBuilder, RunnerConfig, RunnerStats,
};
pub use task::{PendingOp, Task};
pub use types::{CancelLevel, CancelRemap, CancelState};
