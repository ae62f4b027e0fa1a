//! Prepared-task handles and shadow proxies.
//!
//! Submitting a task to a [`Runner`](super::Runner) moves it behind a
//! [`PreparedTask`]: a reference-counted handle that any thread can use to
//! request cancellation, block until completion, or collect the result.
//!
//! Ownership is split explicitly:
//!
//! - the runner holds a strong reference while the task is in flight,
//! - callers hold their own strong references through cloned handles,
//! - the handle's link back to its runner is weak and is cleared on detach.
//!
//! The completion [`Event`] is set exactly once, after the runner has dropped
//! the task from its set.
//!
//! A [`shadow`](PreparedTask::shadow) turns a handle back into an ordinary
//! [`Task`], so one runner can await work hosted by another. The shadow
//! watches the completion event's descriptor in the local reactor and forwards
//! cancellation as a cross-thread request.

use crate::error::{Error, Result};
use crate::runtime::event::Event;
use crate::runtime::reactor::Interest;
use crate::runtime::runner::RunnerShared;
use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::tracing_compat::{debug, warn};
use crate::types::{AtomicCancelLevel, CancelLevel, CancelState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::Poll;
use std::time::{Duration, Instant};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Re-poll interval for a shadow whose completion descriptor could not be created.
const SHADOW_FALLBACK_POLL: Duration = Duration::from_millis(5);

/// Type-erased view of a prepared task, as stored by the runner.
pub(crate) trait Hosted: Send + Sync {
    fn core(&self) -> &HandleCore;
    fn prepare_wait(&self, ctx: &mut PrepareContext);
    /// Returns true once the task is resolved.
    fn finish_wait(&self, ctx: &FinishContext<'_>) -> bool;
    fn cancel_and_wait(&self);
    fn describe(&self, d: &mut Describe);
}

/// State shared by every handle to one prepared task.
pub(crate) struct HandleCore {
    id: u64,
    requested: AtomicCancelLevel,
    runner: Mutex<Weak<RunnerShared>>,
    done: Event,
    detached: AtomicBool,
}

impl HandleCore {
    fn new() -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            requested: AtomicCancelLevel::new(CancelLevel::None),
            runner: Mutex::new(Weak::new()),
            done: Event::new(),
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn requested(&self) -> CancelLevel {
        self.requested.load()
    }

    /// Raises the requested level and wakes the hosting runner.
    pub(crate) fn request_cancel(&self, level: CancelLevel) {
        if self.requested.raise(level) {
            debug!(handle = self.id, level = %level, "cancel requested");
            if let Some(runner) = self.runner() {
                runner.wake();
            }
        }
    }

    pub(crate) fn attach(&self, runner: &Arc<RunnerShared>) {
        *self.runner.lock() = Arc::downgrade(runner);
    }

    pub(crate) fn runner(&self) -> Option<Arc<RunnerShared>> {
        self.runner.lock().upgrade()
    }

    /// Clears the runner link and fires the completion signal.
    ///
    /// Only the first call has any effect.
    pub(crate) fn detach(&self) -> bool {
        if self.detached.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.runner.lock() = Weak::new();
        self.done.set();
        true
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.is_set()
    }

    pub(crate) const fn done(&self) -> &Event {
        &self.done
    }
}

pub(crate) struct Prepared<T> {
    core: HandleCore,
    task: Mutex<Task<T>>,
}

impl<T: Send + 'static> Hosted for Prepared<T> {
    fn core(&self) -> &HandleCore {
        &self.core
    }

    fn prepare_wait(&self, ctx: &mut PrepareContext) {
        let mut task = self.task.lock();
        if task.is_empty() {
            ctx.set_finished();
            return;
        }
        task.prepare_wait(ctx, self.core.requested());
    }

    fn finish_wait(&self, ctx: &FinishContext<'_>) -> bool {
        let mut task = self.task.lock();
        task.is_empty() || task.finish_wait(ctx)
    }

    fn cancel_and_wait(&self) {
        self.core.requested.raise(CancelLevel::Kill);
        let mut task = self.task.lock();
        if task.is_pending() {
            let result = task.cancel_and_wait();
            *task = Task::from_result(result);
        }
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!(
            "prepared #{} (cancel {})",
            self.core.id,
            self.core.requested()
        ));
        d.nested(|d| match self.task.try_lock() {
            Some(task) => task.describe(d),
            None => d.line("<busy>"),
        });
    }
}

/// A handle to a task submitted to a runner.
///
/// Handles are cheap to clone and may be sent to other threads. Dropping every
/// handle does not cancel the task; the runner keeps driving it.
pub struct PreparedTask<T> {
    inner: Arc<Prepared<T>>,
}

impl<T> Clone for PreparedTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> core::fmt::Debug for PreparedTask<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PreparedTask")
            .field("id", &self.inner.core.id)
            .field("requested", &self.inner.core.requested())
            .field("done", &self.inner.core.is_done())
            .finish()
    }
}

impl<T: Send + 'static> PreparedTask<T> {
    pub(crate) fn new(task: Task<T>) -> Self {
        Self {
            inner: Arc::new(Prepared {
                core: HandleCore::new(),
                task: Mutex::new(task),
            }),
        }
    }

    pub(crate) fn hosted(&self) -> Arc<dyn Hosted> {
        self.inner.clone()
    }

    pub(crate) fn core(&self) -> &HandleCore {
        &self.inner.core
    }

    /// Returns a process-unique id for this task.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.core.id
    }

    /// Requests cancellation at `level` from any thread.
    ///
    /// Requests only escalate. The hosting runner is woken and observes the
    /// level on its next preparation pass.
    pub fn request_cancel(&self, level: CancelLevel) {
        self.inner.core.request_cancel(level);
    }

    /// Returns the strongest level requested so far.
    #[must_use]
    pub fn requested_cancel_level(&self) -> CancelLevel {
        self.inner.core.requested()
    }

    /// Returns true once the runner has finished with this task.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.core.is_done()
    }

    /// Blocks until the task is done.
    ///
    /// Some thread must be driving the hosting runner.
    pub fn wait(&self) {
        self.inner.core.done.wait();
    }

    /// Blocks until the task is done or `timeout` elapses.
    ///
    /// Returns true if the task is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.core.done.wait_timeout(timeout)
    }

    /// Takes the result of a finished task.
    ///
    /// Returns `None` while the task is still in flight. The result can be
    /// taken once; later calls return an [`ErrorKind::ResultTaken`](crate::ErrorKind) error.
    pub fn take_result(&self) -> Option<Result<T>> {
        if !self.is_done() {
            return None;
        }
        let mut task = self.inner.task.lock();
        Some(task.take_result().unwrap_or_else(|| Err(Error::result_taken())))
    }

    /// Cancels the task at [`CancelLevel::Kill`], blocks until it is done, and
    /// takes its result.
    ///
    /// On the runner's bound thread, or while the runner is neither bound nor
    /// driven, the task is cancelled in place without touching the runner's
    /// queues. Otherwise the request is forwarded to the runner and this call
    /// blocks on the completion signal until some thread drives it.
    pub fn cancel_and_wait(&self) -> Result<T> {
        if !self.is_done() {
            let core = self.core();
            match core.runner() {
                Some(runner) if runner.is_local() => runner.cancel_local(&self.hosted()),
                Some(_) => {
                    core.request_cancel(CancelLevel::Kill);
                    core.done.wait();
                }
                None => {
                    self.inner.cancel_and_wait();
                    core.detach();
                    core.done.wait();
                }
            }
        }
        self.take_result()
            .unwrap_or_else(|| Err(Error::internal("prepared task finished without a result")))
    }

    /// Presents this handle as a pending task, for awaiting it from another
    /// task graph.
    ///
    /// The shadow takes the result when the handle finishes.
    pub fn shadow(&self) -> Task<T> {
        Task::from_op(ShadowOp {
            handle: self.clone(),
            applied: CancelState::new(),
        })
    }

    /// Renders the nested wait state as text.
    #[must_use]
    pub fn dbg_print(&self) -> String {
        let mut d = Describe::new();
        self.inner.describe(&mut d);
        d.finish()
    }
}

struct ShadowOp<T> {
    handle: PreparedTask<T>,
    applied: CancelState,
}

impl<T: Send + 'static> PendingOp<T> for ShadowOp<T> {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        if self.applied.escalate(level) {
            self.handle.request_cancel(level);
        }
        if self.handle.is_done() {
            ctx.set_finished();
            return;
        }
        match self.handle.core().done().raw_fd() {
            Ok(fd) => {
                ctx.add_poll_item(fd, Interest::READABLE);
            }
            Err(err) => {
                warn!(handle = self.handle.id(), error = %err, "shadow falling back to polling");
                ctx.add_deadline(Instant::now() + SHADOW_FALLBACK_POLL);
            }
        }
    }

    fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<T>> {
        match self.handle.take_result() {
            Some(result) => Poll::Ready(Task::from_result(result)),
            None => Poll::Pending,
        }
    }

    fn cancel_and_wait(&mut self) -> Task<T> {
        Task::from_result(self.handle.cancel_and_wait())
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!("shadow of prepared #{}", self.handle.id()));
    }
}
