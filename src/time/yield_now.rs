use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::CancelLevel;
use std::task::Poll;

/// Operation that completes on the next reactor pass.
struct YieldNow {
    yielded: bool,
}

impl PendingOp<()> for YieldNow {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, _level: CancelLevel) {
        self.yielded = true;
        ctx.set_finished();
    }

    fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<()>> {
        if self.yielded {
            Poll::Ready(Task::value(()))
        } else {
            Poll::Pending
        }
    }

    fn cancel_and_wait(&mut self) -> Task<()> {
        Task::value(())
    }

    fn describe(&self, d: &mut Describe) {
        d.line("yield");
    }
}

/// Yields to the reactor, letting every other in-flight task take a pass.
///
/// The yield completes through the "already finished" path, so it never
/// causes an OS wait. It ignores cancellation.
pub fn yield_now() -> Task<()> {
    Task::from_op(YieldNow { yielded: false })
}
