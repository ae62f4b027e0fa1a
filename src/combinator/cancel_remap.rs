//! Cancel-level remapping.

use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::{CancelLevel, CancelRemap};
use std::task::Poll;

struct RemapOp<T> {
    inner: Task<T>,
    remap: CancelRemap,
}

impl<T: Send + 'static> PendingOp<T> for RemapOp<T> {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.inner.prepare_wait(ctx, self.remap.apply(level));
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<T>> {
        if self.inner.finish_wait(ctx) {
            Poll::Ready(std::mem::take(&mut self.inner))
        } else {
            Poll::Pending
        }
    }

    fn cancel_and_wait(&mut self) -> Task<T> {
        Task::from_result(self.inner.cancel_and_wait())
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!("remap cancel {}", self.remap));
        d.nested(|d| self.inner.describe(d));
    }
}

/// Wraps `task` so that cancel levels falling in the remap's range reach it as
/// the remap's target instead.
///
/// Raising a range to [`CancelLevel::Kill`] makes a graceful stop abrupt;
/// lowering one to [`CancelLevel::None`] shields a section, such as a final
/// flush, from polite cancellation. Forced teardown through
/// [`Task::cancel_and_wait`] is never remapped. Resolved tasks are returned
/// unchanged.
pub fn remap_cancel<T: Send + 'static>(task: Task<T>, remap: CancelRemap) -> Task<T> {
    if !task.is_pending() {
        return task;
    }
    Task::from_op(RemapOp { inner: task, remap })
}
