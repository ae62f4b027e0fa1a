//! A dynamic set of unit tasks sharing one lifetime.
//!
//! A [`TaskGroup`] accepts new members at any time, from any thread, and runs
//! them all in parallel inside the single pending task returned by
//! [`TaskGroup::run`]. Member failures are counted and logged but never fail
//! the group. The group resolves once cancellation reaches its threshold and
//! every member has been drained.

use crate::error::{Error, Result};
use crate::runtime::event::Event;
use crate::runtime::reactor::Interest;
use crate::runtime::{FinishContext, Memento, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::tracing_compat::{debug, warn};
use crate::types::{CancelLevel, CancelState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::Poll;
use std::time::{Duration, Instant};

/// Re-check interval when the post signal has no descriptor.
const POST_FALLBACK_POLL: Duration = Duration::from_millis(5);

#[derive(Default)]
struct Incoming {
    tasks: Vec<Task<()>>,
    closed: bool,
}

struct GroupShared {
    threshold: CancelLevel,
    incoming: Mutex<Incoming>,
    posted: Event,
    running: AtomicBool,
    completed: AtomicU64,
    failures: AtomicU64,
}

impl GroupShared {
    fn settle(&self, result: Result<()>) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        match result {
            Err(error) if !error.is_cancelled() => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %error, "group member failed");
            }
            _ => {}
        }
    }
}

/// A set of tasks that live until the group is told to stop.
///
/// Cloning a group yields another handle to the same set.
#[derive(Clone)]
pub struct TaskGroup {
    shared: Arc<GroupShared>,
}

impl TaskGroup {
    /// Creates a group that stops accepting work and drains once cancellation
    /// reaches `threshold`.
    #[must_use]
    pub fn new(threshold: CancelLevel) -> Self {
        Self {
            shared: Arc::new(GroupShared {
                threshold,
                incoming: Mutex::new(Incoming::default()),
                posted: Event::new(),
                running: AtomicBool::new(false),
                completed: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Adds a member.
    ///
    /// Resolved tasks are accounted for immediately. Posting to a group that
    /// has already finished cancels the task.
    pub fn post(&self, mut task: Task<()>) {
        if let Some(result) = task.take_result() {
            self.shared.settle(result);
            return;
        }
        let mut incoming = self.shared.incoming.lock();
        if incoming.closed {
            drop(incoming);
            debug!("post to a finished group");
            let result = task.cancel_and_wait();
            self.shared.settle(result);
            return;
        }
        incoming.tasks.push(task);
        drop(incoming);
        self.shared.posted.set();
    }

    /// Returns the task that hosts the members.
    ///
    /// Only one runner task may exist per group; a second call resolves to an
    /// [`ErrorKind::InvalidArgument`](crate::ErrorKind) error.
    pub fn run(&self) -> Task<()> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Task::error(Error::invalid_argument("task group is already running"));
        }
        Task::from_op(GroupOp {
            shared: Arc::clone(&self.shared),
            members: Vec::new(),
            applied: CancelState::new(),
        })
    }

    /// Members that have resolved so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    /// Members that resolved to an error other than a cancellation.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Returns true once the group has finished and refuses new members.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.incoming.lock().closed
    }
}

impl core::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("threshold", &self.shared.threshold)
            .field("completed", &self.completed())
            .field("failures", &self.failures())
            .finish_non_exhaustive()
    }
}

struct Member {
    task: Task<()>,
    memento: Memento,
}

struct GroupOp {
    shared: Arc<GroupShared>,
    members: Vec<Member>,
    applied: CancelState,
}

impl GroupOp {
    fn absorb(&mut self) {
        let posted = std::mem::take(&mut self.shared.incoming.lock().tasks);
        self.members.extend(posted.into_iter().map(|task| Member {
            task,
            memento: Memento::default(),
        }));
    }

    fn stopping(&self) -> bool {
        self.applied.applied().is_at_least(self.shared.threshold)
    }

    /// Closes the group if it is stopping and empty.
    fn try_close(&mut self) -> bool {
        if !self.stopping() || !self.members.is_empty() {
            return false;
        }
        let mut incoming = self.shared.incoming.lock();
        if !incoming.tasks.is_empty() {
            return false;
        }
        incoming.closed = true;
        true
    }
}

impl PendingOp<()> for GroupOp {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        self.shared.posted.reset();
        self.absorb();
        let level = self.applied.applied();
        for member in &mut self.members {
            let checkpoint = ctx.checkpoint();
            member.task.prepare_wait(ctx, level);
            member.memento = ctx.memento_since(checkpoint);
        }
        if self.stopping() {
            if self.members.is_empty() {
                ctx.set_finished();
            }
            return;
        }
        match self.shared.posted.raw_fd() {
            Ok(fd) => {
                ctx.add_poll_item(fd, Interest::READABLE);
            }
            Err(err) => {
                warn!(error = %err, "group falling back to polling for posts");
                ctx.add_deadline(Instant::now() + POST_FALLBACK_POLL);
            }
        }
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<()>> {
        let shared = &self.shared;
        self.members.retain_mut(|member| {
            if !ctx.contains(&member.memento) || !member.task.finish_wait(ctx) {
                return true;
            }
            let result = member
                .task
                .take_result()
                .unwrap_or_else(|| Err(Error::internal("member resolved without a result")));
            shared.settle(result);
            false
        });
        if self.try_close() {
            debug!(completed = self.shared.completed.load(Ordering::Relaxed), "group drained");
            Poll::Ready(Task::value(()))
        } else {
            Poll::Pending
        }
    }

    fn cancel_and_wait(&mut self) -> Task<()> {
        self.applied.escalate(CancelLevel::Kill);
        loop {
            self.absorb();
            for mut member in self.members.drain(..) {
                let result = member.task.cancel_and_wait();
                self.shared.settle(result);
            }
            let mut incoming = self.shared.incoming.lock();
            if incoming.tasks.is_empty() {
                incoming.closed = true;
                return Task::value(());
            }
        }
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!(
            "group ({} members, stops at {})",
            self.members.len(),
            self.shared.threshold
        ));
        for member in &self.members {
            d.nested(|d| member.task.describe(d));
        }
    }
}
