//! Combinators for composing tasks.
//!
//! Every combinator takes tasks and returns a task. If its inputs are already
//! resolved, the result is usually resolved too and no reactor pass is needed.
//!
//! - [`Task::then`](crate::Task::then) and friends: sequential continuation
//! - [`join`], [`join_all`]: Run tasks in parallel, waiting for all
//! - [`race`]: Run tasks in parallel, first to resolve wins
//! - [`loop_with`], [`loop_fn`], [`iterate`]: Repeat a stage until told to stop
//! - [`remap_cancel`]: Translate cancel levels before they reach a task
//! - [`cancel_requested`]: Resolve when cancellation reaches a level
//! - [`TaskGroup`]: A dynamic set of tasks posted from anywhere
//!
//! Parallel combinators escalate their remaining children to
//! [`CancelLevel::Abort`](crate::CancelLevel::Abort) once their outcome is
//! decided, and always drain every child before resolving.

mod cancel_remap;
mod exit_guard;
mod group;
mod loops;
mod parallel;
mod sequential;

pub use cancel_remap::remap_cancel;
pub use exit_guard::cancel_requested;
pub use group::TaskGroup;
pub use loops::{Iteration, Step, iterate, loop_fn, loop_with};
pub use parallel::{join, join_all, race};
pub(crate) use sequential::Sequential;
