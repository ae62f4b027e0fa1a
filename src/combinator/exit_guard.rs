//! A task that resolves when cancellation is requested.

use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::CancelLevel;
use std::task::Poll;

struct ExitGuard {
    threshold: CancelLevel,
    triggered: bool,
}

impl PendingOp<()> for ExitGuard {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        if level.is_at_least(self.threshold) {
            self.triggered = true;
            ctx.set_finished();
        }
    }

    fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<()>> {
        if self.triggered {
            Poll::Ready(Task::value(()))
        } else {
            Poll::Pending
        }
    }

    fn cancel_and_wait(&mut self) -> Task<()> {
        Task::value(())
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!("cancel guard (fires at {})", self.threshold));
    }
}

/// Returns a task that stays pending, registering nothing, until the cancel
/// level reaching it is at least `threshold`, then resolves with `()`.
///
/// Useful as the body of a service that only has to live until it is told to
/// stop, or raced against work that should end on a polite request.
pub fn cancel_requested(threshold: CancelLevel) -> Task<()> {
    Task::from_op(ExitGuard {
        threshold,
        triggered: false,
    })
}
