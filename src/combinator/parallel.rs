//! Parallel composition: join and race.
//!
//! A parallel operation owns a list of child tasks and prepares every one of
//! them in each pass, bracketing each with a checkpoint so that the resulting
//! [`Memento`] says which child owns what. On finish only the children whose
//! memento contains the fired selection are advanced; resolved children are
//! removed from the list.
//!
//! Both forms stop early. A join that sees a child fail, and a race that sees
//! any child resolve, escalate the remaining children to
//! [`CancelLevel::Abort`] and keep driving them until the list is empty, so a
//! parallel task never resolves while one of its children is still running.

use crate::error::{Error, Result};
use crate::runtime::{FinishContext, Memento, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::CancelLevel;
use std::task::Poll;

struct Child<T> {
    slot: usize,
    task: Task<T>,
    memento: Memento,
}

/// Children still in flight, with their mementos from the latest pass.
struct Children<T> {
    live: Vec<Child<T>>,
}

impl<T> Children<T> {
    fn new(tasks: Vec<Task<T>>) -> Self {
        Self {
            live: tasks
                .into_iter()
                .enumerate()
                .map(|(slot, task)| Child {
                    slot,
                    task,
                    memento: Memento::default(),
                })
                .collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn prepare(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        for child in &mut self.live {
            let checkpoint = ctx.checkpoint();
            child.task.prepare_wait(ctx, level);
            child.memento = ctx.memento_since(checkpoint);
        }
    }

    /// Advances the children affected by `ctx`, handing each resolved one to
    /// `settle` in registration order.
    fn finish(&mut self, ctx: &FinishContext<'_>, mut settle: impl FnMut(usize, Result<T>)) {
        self.live.retain_mut(|child| {
            if !ctx.contains(&child.memento) || !child.task.finish_wait(ctx) {
                return true;
            }
            let result = child
                .task
                .take_result()
                .unwrap_or_else(|| Err(Error::internal("child resolved without a result")));
            settle(child.slot, result);
            false
        });
    }

    /// Cancels every remaining child and settles it.
    fn drain(&mut self, mut settle: impl FnMut(usize, Result<T>)) {
        for mut child in self.live.drain(..) {
            let result = child.task.cancel_and_wait();
            settle(child.slot, result);
        }
    }

    fn describe(&self, d: &mut Describe) {
        for child in &self.live {
            d.nested(|d| child.task.describe(d));
        }
    }
}

struct JoinAll<T> {
    children: Children<T>,
    values: Vec<Option<T>>,
    failure: Option<Error>,
}

impl<T> JoinAll<T> {
    fn settle(values: &mut [Option<T>], failure: &mut Option<Error>, slot: usize, result: Result<T>) {
        match result {
            Ok(value) => values[slot] = Some(value),
            Err(error) => {
                failure.get_or_insert(error);
            }
        }
    }

    fn outcome(&mut self) -> Task<Vec<T>> {
        if let Some(error) = self.failure.take() {
            return Task::error(error);
        }
        std::mem::take(&mut self.values)
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .map_or_else(
                || Task::error(Error::internal("join finished with a missing result")),
                Task::value,
            )
    }
}

impl<T: Send + 'static> PendingOp<Vec<T>> for JoinAll<T> {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        let level = if self.failure.is_some() {
            level.max(CancelLevel::Abort)
        } else {
            level
        };
        if self.children.is_empty() {
            ctx.set_finished();
        }
        self.children.prepare(ctx, level);
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<Vec<T>>> {
        let Self {
            children,
            values,
            failure,
        } = self;
        children.finish(ctx, |slot, result| Self::settle(values, failure, slot, result));
        if self.children.is_empty() {
            Poll::Ready(self.outcome())
        } else {
            Poll::Pending
        }
    }

    fn cancel_and_wait(&mut self) -> Task<Vec<T>> {
        let Self {
            children,
            values,
            failure,
        } = self;
        children.drain(|slot, result| Self::settle(values, failure, slot, result));
        self.outcome()
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!(
            "join ({} of {} pending{})",
            self.children.live.len(),
            self.values.len(),
            if self.failure.is_some() { ", failing" } else { "" }
        ));
        self.children.describe(d);
    }
}

struct Race<T> {
    children: Children<T>,
    winner: Option<Result<T>>,
}

impl<T: Send + 'static> PendingOp<T> for Race<T> {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        let level = if self.winner.is_some() {
            level.max(CancelLevel::Abort)
        } else {
            level
        };
        if self.children.is_empty() {
            ctx.set_finished();
        }
        self.children.prepare(ctx, level);
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<T>> {
        let winner = &mut self.winner;
        self.children.finish(ctx, |_, result| {
            winner.get_or_insert(result);
        });
        if !self.children.is_empty() {
            return Poll::Pending;
        }
        Poll::Ready(
            self.winner
                .take()
                .map_or_else(|| Task::error(Error::internal("race finished without a winner")), Task::from_result),
        )
    }

    fn cancel_and_wait(&mut self) -> Task<T> {
        let winner = &mut self.winner;
        self.children.drain(|_, result| {
            winner.get_or_insert(result);
        });
        self.winner
            .take()
            .map_or_else(|| Task::error(Error::internal("race finished without a winner")), Task::from_result)
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!(
            "race ({} pending{})",
            self.children.live.len(),
            if self.winner.is_some() { ", decided" } else { "" }
        ));
        self.children.describe(d);
    }
}

/// Runs every task in parallel and collects their values in input order.
///
/// The join fails fast: the first child error becomes the join's error, and
/// the remaining children are cancelled at [`CancelLevel::Abort`] and drained
/// before it resolves. An empty input resolves immediately to an empty vector.
pub fn join_all<T, I>(tasks: I) -> Task<Vec<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Task<T>>,
{
    let mut tasks: Vec<Task<T>> = tasks.into_iter().collect();
    if tasks.iter().all(Task::is_resolved) {
        return tasks
            .iter_mut()
            .map(|task| task.take_result().unwrap_or_else(|| Err(Error::internal("unresolved task"))))
            .collect::<Result<Vec<T>>>()
            .into();
    }
    let mut values = Vec::with_capacity(tasks.len());
    values.resize_with(tasks.len(), || None);
    Task::from_op(JoinAll {
        children: Children::new(tasks),
        values,
        failure: None,
    })
}

/// Runs two tasks in parallel and pairs their values.
///
/// Failure handling is the same as [`join_all`].
pub fn join<A, B>(a: Task<A>, b: Task<B>) -> Task<(A, B)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    enum Either<A, B> {
        Left(A),
        Right(B),
    }

    join_all([a.map(Either::Left), b.map(Either::Right)]).then(|mut items| {
        let right = items.pop();
        let left = items.pop();
        match (left, right) {
            (Some(Either::Left(a)), Some(Either::Right(b))) => Task::value((a, b)),
            _ => Task::error(Error::internal("join lost a branch")),
        }
    })
}

/// Runs every task in parallel and resolves to whichever resolves first.
///
/// The winner may be a value or an error. The losers are cancelled at
/// [`CancelLevel::Abort`] and drained before the race resolves; their results
/// are discarded. Ties within one pass go to the earlier task.
///
/// Racing nothing resolves to an [`ErrorKind::InvalidArgument`](crate::ErrorKind) error.
pub fn race<T, I>(tasks: I) -> Task<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Task<T>>,
{
    let mut tasks: Vec<Task<T>> = tasks.into_iter().collect();
    if tasks.is_empty() {
        return Task::error(Error::invalid_argument("race needs at least one task"));
    }
    if let Some(index) = tasks.iter().position(Task::is_resolved) {
        let mut winner = tasks.swap_remove(index);
        drop(tasks);
        return winner.take_result().map_or_else(
            || Task::error(Error::internal("unresolved winner")),
            Task::from_result,
        );
    }
    Task::from_op(Race {
        children: Children::new(tasks),
        winner: None,
    })
}
