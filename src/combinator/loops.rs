//! Repetition.
//!
//! Two shapes are provided:
//!
//! - [`loop_with`] / [`loop_fn`]: a stage task produces a value, a step
//!   function turns it into the next stage or stops. The loop carries a user
//!   state and gives up once cancellation reaches a configured threshold.
//! - [`iterate`]: a step function is called with the previous stage's value
//!   (none on the first call) and the current cancel level, and chooses
//!   between another stage and a final task.
//!
//! Stages that resolve synchronously are chained inside a single pass, so a
//! long run of already-resolved stages costs no extra reactor iterations.
//! Errors from a stage end the loop and propagate unchanged.

use crate::error::{Error, Result};
use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::{CancelLevel, CancelState};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::task::Poll;

/// Decision returned by a [`loop_with`] step.
#[derive(Debug)]
pub enum Step<S> {
    /// Wait on this task, then call the step again with its value.
    Continue(Task<S>),
    /// End the loop.
    Stop,
}

/// Decision returned by an [`iterate`] step.
#[derive(Debug)]
pub enum Iteration<S, R> {
    /// Wait on this stage, then call the step again with its value.
    Next(Task<S>),
    /// End the loop; the iteration resolves as this task does.
    Done(Task<R>),
}

fn stage_result<S>(stage: &mut Task<S>) -> Result<S> {
    stage
        .take_result()
        .unwrap_or_else(|| Err(Error::internal("stage resolved without a result")))
}

struct LoopOp<S, St, F> {
    stage: Task<S>,
    state: Option<St>,
    threshold: CancelLevel,
    applied: CancelState,
    step: F,
}

impl<S, St, F> LoopOp<S, St, F>
where
    F: FnMut(S, &mut St, CancelLevel) -> Step<S>,
{
    /// Feeds resolved stages to the step until one stays pending.
    fn advance(&mut self) -> Poll<Task<St>> {
        loop {
            if self.stage.is_pending() {
                return Poll::Pending;
            }
            let value = match stage_result(&mut self.stage) {
                Ok(value) => value,
                Err(error) => return Poll::Ready(Task::error(error)),
            };
            let level = self.applied.applied();
            if level.is_at_least(self.threshold) {
                return Poll::Ready(Task::error(Error::cancelled(level)));
            }
            let Some(state) = self.state.as_mut() else {
                return Poll::Ready(Task::error(Error::internal("loop state already taken")));
            };
            match (self.step)(value, state, level) {
                Step::Continue(next) => self.stage = next,
                Step::Stop => {
                    return Poll::Ready(self.state.take().map_or_else(
                        || Task::error(Error::internal("loop state already taken")),
                        Task::value,
                    ));
                }
            }
        }
    }
}

impl<S, St, F> PendingOp<St> for LoopOp<S, St, F>
where
    S: Send + 'static,
    St: Send + 'static,
    F: FnMut(S, &mut St, CancelLevel) -> Step<S> + Send + 'static,
{
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        self.stage.prepare_wait(ctx, self.applied.applied());
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<St>> {
        if !self.stage.finish_wait(ctx) {
            return Poll::Pending;
        }
        self.advance()
    }

    fn cancel_and_wait(&mut self) -> Task<St> {
        match self.stage.cancel_and_wait() {
            Err(error) => Task::error(error),
            Ok(_) => Task::error(Error::cancelled(CancelLevel::Kill)),
        }
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!(
            "loop (gives up at {}, cancel {})",
            self.threshold,
            self.applied.applied()
        ));
        d.nested(|d| self.stage.describe(d));
    }
}

/// Repeats `step` over the values produced by successive stages.
///
/// `initial` is the first stage. Each time a stage resolves with a value, the
/// step receives that value, the loop state, and the current cancel level,
/// and returns the next stage or [`Step::Stop`]. On stop the loop resolves to
/// its state.
///
/// Once cancellation reaches `threshold` the step is not called again: the
/// next stage value resolves the loop to a cancellation error instead. The
/// level is still forwarded to the running stage, which usually ends it
/// sooner.
///
/// A panic in `step` resolves the loop to an
/// [`ErrorKind::Panicked`](crate::ErrorKind) error.
pub fn loop_with<S, St, F>(initial: Task<S>, state: St, threshold: CancelLevel, step: F) -> Task<St>
where
    S: Send + 'static,
    St: Send + 'static,
    F: FnMut(S, &mut St, CancelLevel) -> Step<S> + Send + 'static,
{
    let mut op = LoopOp {
        stage: initial,
        state: Some(state),
        threshold,
        applied: CancelState::new(),
        step,
    };
    match catch_unwind(AssertUnwindSafe(|| op.advance())) {
        Ok(Poll::Pending) => Task::from_op(op),
        Ok(Poll::Ready(task)) => task,
        Err(payload) => Task::error(Error::panicked(payload.as_ref())),
    }
}

/// [`loop_with`] without carried state.
pub fn loop_fn<S, F>(initial: Task<S>, threshold: CancelLevel, mut step: F) -> Task<()>
where
    S: Send + 'static,
    F: FnMut(S, CancelLevel) -> Step<S> + Send + 'static,
{
    loop_with(initial, (), threshold, move |value, (), level| step(value, level))
}

struct IterateOp<S, F> {
    stage: Task<S>,
    applied: CancelState,
    step: F,
}

impl<S, R, F> IterateOp<S, F>
where
    F: FnMut(Option<S>, CancelLevel) -> Iteration<S, R>,
{
    fn advance(&mut self) -> Poll<Task<R>> {
        loop {
            if self.stage.is_pending() {
                return Poll::Pending;
            }
            let value = match stage_result(&mut self.stage) {
                Ok(value) => value,
                Err(error) => return Poll::Ready(Task::error(error)),
            };
            match (self.step)(Some(value), self.applied.applied()) {
                Iteration::Next(next) => self.stage = next,
                Iteration::Done(task) => return Poll::Ready(task),
            }
        }
    }
}

impl<S, R, F> PendingOp<R> for IterateOp<S, F>
where
    S: Send + 'static,
    R: Send + 'static,
    F: FnMut(Option<S>, CancelLevel) -> Iteration<S, R> + Send + 'static,
{
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        self.stage.prepare_wait(ctx, self.applied.applied());
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<R>> {
        if !self.stage.finish_wait(ctx) {
            return Poll::Pending;
        }
        self.advance()
    }

    fn cancel_and_wait(&mut self) -> Task<R> {
        match self.stage.cancel_and_wait() {
            Err(error) => Task::error(error),
            Ok(_) => Task::error(Error::cancelled(CancelLevel::Kill)),
        }
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!("iterate (cancel {})", self.applied.applied()));
        d.nested(|d| self.stage.describe(d));
    }
}

/// Builds a loop from a single step function.
///
/// The step is first called with `None` when `iterate` is called, then with
/// the value of each stage it returned. It also receives the current cancel
/// level and decides itself how to react to it. Returning
/// [`Iteration::Done`] ends the loop with that task.
///
/// Cancelling the iteration outright cancels the running stage and does not
/// call the step again.
pub fn iterate<S, R, F>(mut step: F) -> Task<R>
where
    S: Send + 'static,
    R: Send + 'static,
    F: FnMut(Option<S>, CancelLevel) -> Iteration<S, R> + Send + 'static,
{
    let first = match catch_unwind(AssertUnwindSafe(|| step(None, CancelLevel::None))) {
        Ok(Iteration::Next(stage)) => stage,
        Ok(Iteration::Done(task)) => return task,
        Err(payload) => return Task::error(Error::panicked(payload.as_ref())),
    };
    let mut op = IterateOp {
        stage: first,
        applied: CancelState::new(),
        step,
    };
    match catch_unwind(AssertUnwindSafe(|| op.advance())) {
        Ok(Poll::Pending) => Task::from_op(op),
        Ok(Poll::Ready(task)) => task,
        Err(payload) => Task::error(Error::panicked(payload.as_ref())),
    }
}
