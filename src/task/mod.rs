//! The task value and the pending-operation contract.
//!
//! A [`Task<T>`] is the currency every part of stagehand passes around. It is
//! exactly one of:
//!
//! - **empty**: moved-from; waiting on it is a programming error and panics,
//! - **value**: resolved with a `T`,
//! - **error**: resolved with an [`Error`],
//! - **pending**: exclusively owns one boxed [`PendingOp`].
//!
//! Pending operations never poll themselves. The reactor asks each of them to
//! register interest with [`PendingOp::prepare_wait`], performs a single OS
//! wait, then calls [`PendingOp::finish_wait`] only on the operations whose
//! interest fired. An operation that finishes returns the task that replaces
//! it, which may itself still be pending (a sequential chain moving on to its
//! next stage).
//!
//! Dropping a pending task cancels it at [`CancelLevel::Kill`] and blocks until
//! the operation reaches a terminal state.
//!
//! # Example
//!
//! ```
//! use stagehand::Task;
//!
//! let mut task = Task::value(20).then(|n| Task::value(n + 1)).map(|n| n * 2);
//! assert_eq!(task.take_result().unwrap().unwrap(), 42);
//! ```

mod describe;

pub use describe::Describe;

use crate::combinator::{Sequential, remap_cancel};
use crate::error::{Error, Result};
use crate::runtime::{FinishContext, PrepareContext};
use crate::types::{CancelLevel, CancelRemap};
use core::fmt;
use std::ops::{BitOr, Range};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::task::Poll;
use std::time::Duration;

/// A long-running operation that participates in batched waiting.
///
/// Implementations must tolerate `prepare_wait` being called once per reactor
/// iteration for as long as they stay pending, and must reflect their current
/// state each time. The `level` passed to `prepare_wait` is the strongest
/// cancellation requested so far; it never decreases between calls.
pub trait PendingOp<T>: Send {
    /// Registers the operation's wait interest for this pass.
    ///
    /// An operation that can complete without waiting calls
    /// [`PrepareContext::set_finished`].
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel);

    /// Advances the operation after something it registered fired.
    ///
    /// Returns `Poll::Pending` to stay in the reactor's set, or the task that
    /// replaces this operation.
    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<T>>;

    /// Drives the operation to a terminal state at the strongest level,
    /// blocking if necessary.
    ///
    /// The returned task must be resolved.
    fn cancel_and_wait(&mut self) -> Task<T>;

    /// Writes a description of the current wait state.
    fn describe(&self, d: &mut Describe) {
        d.line(std::any::type_name::<Self>());
    }
}

enum State<T> {
    Empty,
    Value(T),
    Error(Error),
    Pending {
        op: Box<dyn PendingOp<T>>,
        requested: CancelLevel,
    },
}

/// A computation that may be resolved or still pending.
#[must_use = "a pending task does nothing unless it is run or composed"]
pub struct Task<T> {
    state: State<T>,
}

impl<T> Task<T> {
    /// Creates a task resolved with `value`.
    pub const fn value(value: T) -> Self {
        Self {
            state: State::Value(value),
        }
    }

    /// Creates a task resolved with `error`.
    pub const fn error(error: Error) -> Self {
        Self {
            state: State::Error(error),
        }
    }

    /// Creates a resolved task from a result.
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::value(value),
            Err(error) => Self::error(error),
        }
    }

    /// Creates an empty task.
    pub const fn empty() -> Self {
        Self {
            state: State::Empty,
        }
    }

    /// Creates a pending task owning `op`.
    pub fn from_op(op: impl PendingOp<T> + 'static) -> Self {
        Self {
            state: State::Pending {
                op: Box::new(op),
                requested: CancelLevel::None,
            },
        }
    }

    /// Returns true if the task is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.state, State::Empty)
    }

    /// Returns true if the task resolved with a value.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self.state, State::Value(_))
    }

    /// Returns true if the task resolved with an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.state, State::Error(_))
    }

    /// Returns true if the task owns a pending operation.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    /// Returns true if the task resolved with a value or an error.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.state, State::Value(_) | State::Error(_))
    }

    /// Returns the error of a task that resolved with one.
    #[must_use]
    pub const fn error_ref(&self) -> Option<&Error> {
        match &self.state {
            State::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the cancel level explicitly requested on this task.
    #[must_use]
    pub const fn requested_cancel_level(&self) -> CancelLevel {
        match &self.state {
            State::Pending { requested, .. } => *requested,
            _ => CancelLevel::None,
        }
    }

    /// Takes the result out of a resolved task, leaving it empty.
    ///
    /// Returns `None` and leaves the task untouched if it is pending or empty.
    pub fn take_result(&mut self) -> Option<Result<T>> {
        match self.take_state() {
            State::Value(value) => Some(Ok(value)),
            State::Error(error) => Some(Err(error)),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Requests cancellation at `level`.
    ///
    /// Requests only escalate: a level at or below the current request has no
    /// effect. Resolved tasks ignore requests. The operation observes the level
    /// on its next `prepare_wait`.
    pub fn request_cancel(&mut self, level: CancelLevel) {
        if let State::Pending { requested, .. } = &mut self.state {
            *requested = (*requested).max(level);
        }
    }

    /// Registers this task's wait interest.
    ///
    /// Resolved tasks mark themselves finished. A panic inside the operation
    /// resolves the task to an [`ErrorKind::Panicked`](crate::ErrorKind) error.
    ///
    /// # Panics
    ///
    /// Panics if the task is empty.
    pub fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        let panicked = match &mut self.state {
            State::Empty => panic!("prepare_wait called on an empty task"),
            State::Value(_) | State::Error(_) => {
                ctx.set_finished();
                return;
            }
            State::Pending { op, requested } => {
                let level = level.max(*requested);
                catch_unwind(AssertUnwindSafe(|| op.prepare_wait(ctx, level))).err()
            }
        };
        if let Some(payload) = panicked {
            self.state = State::Error(Error::panicked(payload.as_ref()));
            ctx.set_finished();
        }
    }

    /// Advances a pending task after its interest fired.
    ///
    /// Returns true once the task is resolved. When the operation hands back a
    /// replacement that is still pending, the replacement inherits this task's
    /// requested level and the call returns false.
    ///
    /// # Panics
    ///
    /// Panics if the task is empty.
    pub fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> bool {
        let (outcome, requested) = match &mut self.state {
            State::Empty => panic!("finish_wait called on an empty task"),
            State::Value(_) | State::Error(_) => return true,
            State::Pending { op, requested } => (
                catch_unwind(AssertUnwindSafe(|| op.finish_wait(ctx))),
                *requested,
            ),
        };
        match outcome {
            Ok(Poll::Pending) => false,
            Ok(Poll::Ready(mut next)) => {
                next.request_cancel(requested);
                self.state = next.take_state();
                if self.is_empty() {
                    self.state = State::Error(Error::internal("operation resolved to an empty task"));
                }
                self.is_resolved()
            }
            Err(payload) => {
                self.state = State::Error(Error::panicked(payload.as_ref()));
                true
            }
        }
    }

    /// Cancels the task at the strongest level, blocks until it reaches a
    /// terminal state, and takes its result.
    ///
    /// Resolved tasks return their result immediately. The task is left empty.
    ///
    /// # Panics
    ///
    /// Panics if the task is empty.
    pub fn cancel_and_wait(&mut self) -> Result<T> {
        loop {
            match self.take_state() {
                State::Empty => panic!("cancel_and_wait called on an empty task"),
                State::Value(value) => return Ok(value),
                State::Error(error) => return Err(error),
                State::Pending { mut op, .. } => {
                    let mut next = catch_unwind(AssertUnwindSafe(|| op.cancel_and_wait()))
                        .unwrap_or_else(|payload| Self::error(Error::panicked(payload.as_ref())));
                    drop(op);
                    self.state = next.take_state();
                    if self.is_empty() {
                        return Err(Error::internal("operation cancelled to an empty task"));
                    }
                }
            }
        }
    }

    /// Writes a description of this task's wait state.
    pub fn describe(&self, d: &mut Describe) {
        match &self.state {
            State::Empty => d.line("empty"),
            State::Value(_) => d.line("value"),
            State::Error(error) => d.line(format_args!("error: {error}")),
            State::Pending { op, requested } => {
                if requested.is_requested() {
                    d.line(format_args!("cancel requested: {requested}"));
                }
                op.describe(d);
            }
        }
    }

    /// Renders the nested wait state as text.
    #[must_use]
    pub fn dbg_print(&self) -> String {
        let mut d = Describe::new();
        self.describe(&mut d);
        d.finish()
    }

    fn take_state(&mut self) -> State<T> {
        std::mem::replace(&mut self.state, State::Empty)
    }
}

impl<T: Send + 'static> Task<T> {
    /// Chains a continuation that receives the value of this task.
    ///
    /// Errors skip the continuation and propagate unchanged. If this task is
    /// already resolved, the continuation runs immediately.
    pub fn then<U, F>(self, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Task<U> + Send + 'static,
    {
        self.continue_with(move |result| match result {
            Ok(value) => f(value),
            Err(error) => Task::error(error),
        })
    }

    /// Chains a continuation that receives the full result of this task.
    ///
    /// # Panics
    ///
    /// Panics if the task is empty.
    pub fn continue_with<U, F>(mut self, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<T>) -> Task<U> + Send + 'static,
    {
        assert!(!self.is_empty(), "continuation attached to an empty task");
        match self.take_result() {
            Some(result) => guarded(move || f(result)),
            None => Task::from_op(Sequential::new(self, f)),
        }
    }

    /// Transforms the value of this task.
    pub fn map<U, F>(self, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Task::value(f(value)))
    }

    /// Transforms the error of this task.
    pub fn map_err<F>(self, f: F) -> Self
    where
        F: FnOnce(Error) -> Error + Send + 'static,
    {
        self.continue_with(move |result| Self::from_result(result.map_err(f)))
    }

    /// Replaces an error with the task returned by `f`.
    pub fn recover<F>(self, f: F) -> Self
    where
        F: FnOnce(Error) -> Self + Send + 'static,
    {
        self.continue_with(move |result| match result {
            Ok(value) => Self::value(value),
            Err(error) => f(error),
        })
    }

    /// Substitutes a value when the task resolves to a cancellation.
    ///
    /// `f` receives the level at which the operation gave up. Other errors
    /// propagate unchanged.
    pub fn catch_cancelled<F>(self, f: F) -> Self
    where
        F: FnOnce(CancelLevel) -> T + Send + 'static,
    {
        self.recover(move |error| {
            if error.is_cancelled() {
                Self::value(f(error.cancel_level().unwrap_or(CancelLevel::Kill)))
            } else {
                Self::error(error)
            }
        })
    }

    /// Keeps `value` alive until this task resolves.
    pub fn keep_alive<K: Send + 'static>(self, value: K) -> Self {
        self.continue_with(move |result| {
            drop(value);
            Self::from_result(result)
        })
    }

    /// Remaps cancel levels in `range` to `target` before they reach this task.
    pub fn remap_cancel(self, range: Range<CancelLevel>, target: CancelLevel) -> Self {
        remap_cancel(self, CancelRemap::new(range, target))
    }

    /// Fails with [`ErrorKind::TimedOut`](crate::ErrorKind) if this task does
    /// not resolve within `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        crate::time::with_timeout(self, timeout)
    }
}

/// Runs `f`, converting a panic into a resolved-error task.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Task<T>) -> Task<T> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Task::error(Error::panicked(payload.as_ref())))
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if self.is_pending() {
            let _ = self.cancel_and_wait();
        }
    }
}

impl<T> Default for Task<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Result<T>> for Task<T> {
    fn from(result: Result<T>) -> Self {
        Self::from_result(result)
    }
}

impl<T: fmt::Debug> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Empty => f.write_str("Task::Empty"),
            State::Value(value) => f.debug_tuple("Task::Value").field(value).finish(),
            State::Error(error) => f.debug_tuple("Task::Error").field(error).finish(),
            State::Pending { requested, .. } => f
                .debug_struct("Task::Pending")
                .field("requested", requested)
                .finish_non_exhaustive(),
        }
    }
}

/// Joins two unit tasks; resolves once both have.
impl BitOr for Task<()> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        crate::combinator::join(self, rhs).map(|((), ())| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::cancel_requested;
    use crate::error::ErrorKind;
    use crate::runtime::Selection;
    use crate::test_utils::init_test_logging;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    /// Resolves to its value on the first finish, or to a cancellation once
    /// the level reaches `Quit`.
    struct Once {
        value: Option<u32>,
        level: CancelLevel,
    }

    impl PendingOp<u32> for Once {
        fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
            self.level = level;
            ctx.set_finished();
        }

        fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<u32>> {
            if self.level >= CancelLevel::Quit {
                return Poll::Ready(Task::error(Error::cancelled(self.level)));
            }
            Poll::Ready(Task::value(self.value.take().unwrap_or_default()))
        }

        fn cancel_and_wait(&mut self) -> Task<u32> {
            Task::error(Error::cancelled(CancelLevel::Kill))
        }
    }

    fn drive(task: &mut Task<u32>, level: CancelLevel) -> bool {
        let mut prep = PrepareContext::new();
        task.prepare_wait(&mut prep, level);
        let ctx = FinishContext::new(&prep, Selection::Finished);
        task.finish_wait(&ctx)
    }

    #[test]
    fn state_queries() {
        init_test("state_queries");
        let value = Task::value(1);
        assert!(value.is_value() && value.is_resolved() && !value.is_pending());
        let error: Task<u8> = Task::error(Error::msg("nope"));
        assert!(error.is_error());
        assert_eq!(error.error_ref().map(Error::kind), Some(ErrorKind::User));
        let empty: Task<u8> = Task::default();
        assert!(empty.is_empty());
        let pending = cancel_requested(CancelLevel::Quit);
        assert!(pending.is_pending());
        crate::test_complete!("state_queries");
    }

    #[test]
    fn then_on_resolved_runs_immediately() {
        let mut task = Task::value(2).then(|n| Task::value(n * 10));
        assert_eq!(task.take_result().unwrap().unwrap(), 20);
        assert!(task.is_empty());
    }

    #[test]
    fn then_skips_continuation_on_error() {
        let mut task = Task::<u32>::error(Error::msg("upstream"))
            .then(|_| -> Task<u32> { unreachable!("continuation must not run") });
        let err = task.take_result().unwrap().unwrap_err();
        assert_eq!(err.message(), Some("upstream"));
    }

    #[test]
    fn continuation_panic_becomes_error() {
        let mut task = Task::value(1).then(|_| -> Task<u32> { panic!("boom") });
        let err = task.take_result().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert_eq!(err.message(), Some("boom"));
    }

    #[test]
    fn finish_adopts_replacement() {
        init_test("finish_adopts_replacement");
        let mut task = Task::from_op(Once {
            value: Some(7),
            level: CancelLevel::None,
        })
        .map(|n| n + 1);
        assert!(task.is_pending());
        assert!(drive(&mut task, CancelLevel::None));
        assert_eq!(task.take_result().unwrap().unwrap(), 8);
        crate::test_complete!("finish_adopts_replacement");
    }

    #[test]
    fn requested_level_reaches_operation() {
        let mut task = Task::from_op(Once {
            value: Some(7),
            level: CancelLevel::None,
        });
        task.request_cancel(CancelLevel::Abort);
        task.request_cancel(CancelLevel::Quit);
        assert_eq!(task.requested_cancel_level(), CancelLevel::Abort);
        assert!(drive(&mut task, CancelLevel::None));
        let err = task.take_result().unwrap().unwrap_err();
        assert_eq!(err.cancel_level(), Some(CancelLevel::Abort));
    }

    #[test]
    fn cancel_and_wait_resolves_pending() {
        let mut task = Task::from_op(Once {
            value: Some(1),
            level: CancelLevel::None,
        });
        crate::assert_cancelled!(task.cancel_and_wait());
        assert!(task.is_empty());
    }

    #[test]
    fn catch_cancelled_substitutes_value() {
        let mut task = Task::from_op(Once {
            value: Some(1),
            level: CancelLevel::None,
        })
        .catch_cancelled(|level| u32::from(level.as_u8()) + 100);
        assert!(drive(&mut task, CancelLevel::Quit));
        assert_eq!(task.take_result().unwrap().unwrap(), 101);
    }

    #[test]
    fn describe_nests_pending_state() {
        let task = Task::from_op(Once {
            value: None,
            level: CancelLevel::None,
        });
        assert!(task.dbg_print().contains("Once"));
        let err: Task<()> = Task::error(Error::timed_out());
        assert_eq!(err.dbg_print(), "error: timed out\n");
    }

    #[test]
    #[should_panic(expected = "empty task")]
    fn preparing_empty_task_panics() {
        let mut task: Task<()> = Task::empty();
        let mut prep = PrepareContext::new();
        task.prepare_wait(&mut prep, CancelLevel::None);
    }
}
