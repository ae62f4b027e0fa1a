//! Deadline-based sleeping.

use crate::error::Error;
use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::{CancelLevel, CancelState};
use std::task::Poll;
use std::time::{Duration, Instant};

enum Deadline {
    /// Fixed on the first preparation pass.
    After(Duration),
    At(Instant),
}

struct Sleep {
    deadline: Deadline,
    applied: CancelState,
}

impl Sleep {
    fn deadline(&mut self) -> Instant {
        match self.deadline {
            Deadline::At(at) => at,
            Deadline::After(duration) => {
                let at = Instant::now()
                    .checked_add(duration)
                    .unwrap_or_else(far_future);
                self.deadline = Deadline::At(at);
                at
            }
        }
    }

    fn gave_up(&self) -> bool {
        self.applied.applied().is_at_least(CancelLevel::Quit)
    }
}

/// An instant no sleep will reach, for durations too large to add.
fn far_future() -> Instant {
    let now = Instant::now();
    now.checked_add(Duration::from_secs(86_400 * 365 * 30))
        .unwrap_or(now)
}

impl PendingOp<()> for Sleep {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        if self.gave_up() {
            ctx.set_finished();
            return;
        }
        let deadline = self.deadline();
        if deadline <= Instant::now() {
            ctx.set_finished();
        } else {
            ctx.add_deadline(deadline);
        }
    }

    fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<()>> {
        if self.gave_up() {
            return Poll::Ready(Task::error(Error::cancelled(self.applied.applied())));
        }
        if self.deadline() <= Instant::now() {
            Poll::Ready(Task::value(()))
        } else {
            Poll::Pending
        }
    }

    fn cancel_and_wait(&mut self) -> Task<()> {
        Task::error(Error::cancelled(CancelLevel::Kill))
    }

    fn describe(&self, d: &mut Describe) {
        match self.deadline {
            Deadline::After(duration) => d.line(format_args!("sleep {duration:?} (not started)")),
            Deadline::At(at) => d.line(format_args!(
                "sleep ({:?} left)",
                at.saturating_duration_since(Instant::now())
            )),
        }
    }
}

/// Returns a task that resolves once `duration` has elapsed.
///
/// The clock starts on the first reactor pass that sees the task, not when
/// the task is built, so a sleep composed ahead of time still waits its full
/// duration. Any cancellation resolves it to a cancellation error.
pub fn sleep(duration: Duration) -> Task<()> {
    Task::from_op(Sleep {
        deadline: Deadline::After(duration),
        applied: CancelState::new(),
    })
}

/// Returns a task that resolves at `deadline`.
///
/// A deadline in the past completes on the next pass without an OS wait.
pub fn sleep_until(deadline: Instant) -> Task<()> {
    Task::from_op(Sleep {
        deadline: Deadline::At(deadline),
        applied: CancelState::new(),
    })
}

/// Fails with an [`ErrorKind::TimedOut`](crate::ErrorKind) error if `task`
/// does not resolve within `timeout`.
///
/// The task and the timer race; whichever loses is cancelled at
/// [`CancelLevel::Abort`] and drained first.
pub fn with_timeout<T: Send + 'static>(task: Task<T>, timeout: Duration) -> Task<T> {
    if !task.is_pending() {
        return task;
    }
    let timer = sleep(timeout).then(|()| Task::error(Error::timed_out()));
    crate::combinator::race([task, timer])
}
