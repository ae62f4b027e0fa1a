//! Sequential continuation.
//!
//! [`Task::then`] and [`Task::continue_with`] build on [`Sequential`]: a
//! pending operation that forwards waiting to its source task and, once the
//! source resolves, is replaced by whatever the continuation returns.

use crate::error::{Error, Result};
use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task, guarded};
use crate::types::CancelLevel;
use std::task::Poll;

enum Stage<S, F> {
    Waiting { source: Task<S>, next: F },
    Done,
}

/// Waits on a source task, then hands its result to a continuation.
pub(crate) struct Sequential<S, F> {
    stage: Stage<S, F>,
}

impl<S, F> Sequential<S, F> {
    pub(crate) fn new(source: Task<S>, next: F) -> Self {
        Self {
            stage: Stage::Waiting { source, next },
        }
    }
}

impl<S, T, F> PendingOp<T> for Sequential<S, F>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(Result<S>) -> Task<T> + Send + 'static,
{
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        match &mut self.stage {
            Stage::Waiting { source, .. } => source.prepare_wait(ctx, level),
            Stage::Done => ctx.set_finished(),
        }
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<T>> {
        if let Stage::Waiting { source, .. } = &mut self.stage {
            if !source.finish_wait(ctx) {
                return Poll::Pending;
            }
        }
        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Waiting { mut source, next } => {
                let result = source
                    .take_result()
                    .unwrap_or_else(|| Err(Error::internal("source resolved without a result")));
                Poll::Ready(next(result))
            }
            Stage::Done => Poll::Ready(Task::error(Error::internal("continuation already ran"))),
        }
    }

    fn cancel_and_wait(&mut self) -> Task<T> {
        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Waiting { mut source, next } => {
                let result = source.cancel_and_wait();
                let mut follow = guarded(move || next(result));
                Task::from_result(follow.cancel_and_wait())
            }
            Stage::Done => Task::error(Error::internal("continuation already ran")),
        }
    }

    fn describe(&self, d: &mut Describe) {
        d.line("then");
        if let Stage::Waiting { source, .. } = &self.stage {
            d.nested(|d| source.describe(d));
        }
    }
}
