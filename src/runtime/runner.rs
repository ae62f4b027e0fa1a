//! The runner: one reactor loop driven by one thread at a time.
//!
//! Each iteration of [`Runner::run_until`]:
//!
//! 1. resets the wake event and moves newly submitted tasks into the set,
//! 2. registers the wake descriptor at index 0, then asks every in-flight
//!    task to prepare, recording a [`Memento`] per task,
//! 3. if any task marked itself finished, skips the OS wait and finishes
//!    exactly those tasks,
//! 4. otherwise performs one OS wait bounded by the earliest deadline, then
//!    finishes the owner of every fired descriptor and expired deadline,
//!    located by binary search over the mementos,
//! 5. detaches the tasks that resolved.
//!
//! The loop ends when the target task has been detached or nothing is left
//! in flight.
//!
//! Other threads interact with a runner only by submitting (through an inbox
//! and the wake event) and by raising cancel levels on prepared handles. The
//! in-flight set is locked by the driving thread for the whole iteration
//! except the OS wait.

use crate::error::{Error, Result};
use crate::runtime::builder::RunnerBuilder;
use crate::runtime::config::RunnerConfig;
use crate::runtime::event::Event;
use crate::runtime::prepared::{HandleCore, Hosted, PreparedTask};
use crate::runtime::reactor::{Interest, Poller};
use crate::runtime::wait_context::{FinishContext, Memento, PrepareContext, Selection};
use crate::task::{Describe, Task};
use crate::tracing_compat::{debug, trace, warn};
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Counters describing what a runner has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Reactor iterations, fast passes included.
    pub iterations: u64,
    /// OS wait calls issued.
    pub wait_calls: u64,
    /// Iterations that skipped the OS wait because a task was already finished.
    pub fast_passes: u64,
    /// OS waits after which no task was finished.
    pub spurious_wakes: u64,
    /// `finish_wait` calls made after an OS wait.
    pub dispatches: u64,
    /// Tasks submitted.
    pub submissions: u64,
    /// Tasks detached after resolving.
    pub completions: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    iterations: AtomicU64,
    wait_calls: AtomicU64,
    fast_passes: AtomicU64,
    spurious_wakes: AtomicU64,
    dispatches: AtomicU64,
    submissions: AtomicU64,
    completions: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RunnerStats {
        RunnerStats {
            iterations: self.iterations.load(Ordering::Relaxed),
            wait_calls: self.wait_calls.load(Ordering::Relaxed),
            fast_passes: self.fast_passes.load(Ordering::Relaxed),
            spurious_wakes: self.spurious_wakes.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
        }
    }
}

struct Entry {
    hosted: Arc<dyn Hosted>,
    memento: Memento,
}

#[derive(Default)]
struct Inbox {
    pending: Vec<Arc<dyn Hosted>>,
    closed: bool,
}

pub(crate) struct RunnerShared {
    config: RunnerConfig,
    entries: Mutex<Vec<Entry>>,
    inbox: Mutex<Inbox>,
    wake: Event,
    poller: Mutex<Box<dyn Poller>>,
    thread: Mutex<Option<ThreadId>>,
    driving: AtomicBool,
    stats: StatCounters,
}

/// Releases the thread binding taken by a driving call.
struct Binding<'a> {
    shared: &'a RunnerShared,
    release_thread: bool,
}

impl Drop for Binding<'_> {
    fn drop(&mut self) {
        if self.release_thread {
            *self.shared.thread.lock() = None;
        }
        self.shared.driving.store(false, Ordering::Release);
    }
}

impl RunnerShared {
    pub(crate) fn wake(&self) {
        self.wake.set();
    }

    /// True if the calling thread may cancel hosted tasks in place: it is the
    /// bound thread, or nobody is bound or driving.
    pub(crate) fn is_local(&self) -> bool {
        match *self.thread.lock() {
            Some(id) => id == thread::current().id(),
            None => !self.driving.load(Ordering::Acquire),
        }
    }

    fn bind_current_thread(&self) -> Result<Binding<'_>> {
        let current = thread::current().id();
        let mut bound = self.thread.lock();
        let release_thread = match *bound {
            Some(id) if id != current => {
                return Err(Error::wrong_thread(format!(
                    "runner {:?} is bound to another thread",
                    self.config.name
                )));
            }
            Some(_) => false,
            None => {
                *bound = Some(current);
                true
            }
        };
        if self.driving.swap(true, Ordering::AcqRel) {
            if release_thread {
                *bound = None;
            }
            return Err(Error::wrong_thread(format!(
                "runner {:?} is already being driven",
                self.config.name
            )));
        }
        Ok(Binding {
            shared: self,
            release_thread,
        })
    }

    fn submit_hosted(self: &Arc<Self>, hosted: Arc<dyn Hosted>) {
        let mut inbox = self.inbox.lock();
        if inbox.closed {
            drop(inbox);
            debug!(runner = %self.config.name, handle = hosted.core().id(), "submit after shutdown");
            hosted.cancel_and_wait();
            hosted.core().detach();
            return;
        }
        hosted.core().attach(self);
        inbox.pending.push(hosted);
        drop(inbox);
        StatCounters::bump(&self.stats.submissions);
        self.wake.set();
    }

    fn submit<T: Send + 'static>(self: &Arc<Self>, task: Task<T>) -> PreparedTask<T> {
        assert!(!task.is_empty(), "submitted an empty task");
        let resolved = task.is_resolved();
        let prepared = PreparedTask::new(task);
        if resolved {
            StatCounters::bump(&self.stats.submissions);
            StatCounters::bump(&self.stats.completions);
            prepared.core().detach();
        } else {
            debug!(runner = %self.config.name, handle = prepared.id(), "task submitted");
            self.submit_hosted(prepared.hosted());
        }
        prepared
    }

    /// Cancels a hosted task in place.
    ///
    /// Only the task's own lock is taken. The inbox and the in-flight set are
    /// left alone; the reactor loop drops detached tasks when it next runs.
    pub(crate) fn cancel_local(&self, hosted: &Arc<dyn Hosted>) {
        let id = hosted.core().id();
        hosted.cancel_and_wait();
        if hosted.core().detach() {
            StatCounters::bump(&self.stats.completions);
        }
        debug!(runner = %self.config.name, handle = id, "task cancelled locally");
    }

    fn absorb_inbox(&self, entries: &mut Vec<Entry>) {
        let mut inbox = self.inbox.lock();
        entries.extend(inbox.pending.drain(..).map(|hosted| Entry {
            hosted,
            memento: Memento::default(),
        }));
    }

    fn wait_timeout(&self, prep: &PrepareContext) -> Option<Duration> {
        let until_deadline = prep
            .earliest_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        match (until_deadline, self.config.max_wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs the reactor loop until `target` is detached or nothing is in flight.
    fn drive(&self, target: &HandleCore) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut prep = PrepareContext::with_capacity(self.config.initial_capacity);
        loop {
            self.wake.reset();
            self.absorb_inbox(&mut entries);
            entries.retain(|entry| !entry.hosted.core().is_detached());
            if target.is_detached() || entries.is_empty() {
                return Ok(());
            }
            self.iterate(&mut entries, &mut prep)?;
        }
    }

    fn iterate(&self, entries: &mut MutexGuard<'_, Vec<Entry>>, prep: &mut PrepareContext) -> Result<()> {
        StatCounters::bump(&self.stats.iterations);
        prep.clear();
        prep.add_poll_item(self.wake.raw_fd()?, Interest::READABLE);
        for entry in entries.iter_mut() {
            let checkpoint = prep.checkpoint();
            entry.hosted.prepare_wait(prep);
            entry.memento = prep.memento_since(checkpoint);
        }

        let mut finished: SmallVec<[usize; 8]> = SmallVec::new();
        if prep.finished_count() > 0 {
            StatCounters::bump(&self.stats.fast_passes);
            trace!(
                runner = %self.config.name,
                ops = entries.len(),
                finished = prep.finished_count(),
                "fast pass"
            );
            let ctx = FinishContext::new(prep, Selection::Finished);
            for (index, entry) in entries.iter().enumerate() {
                if entry.memento.is_finished() && entry.hosted.finish_wait(&ctx) {
                    finished.push(index);
                }
            }
        } else {
            let timeout = self.wait_timeout(prep);
            trace!(
                runner = %self.config.name,
                ops = entries.len(),
                fds = prep.poll_items().len(),
                timeout = ?timeout,
                "waiting"
            );
            StatCounters::bump(&self.stats.wait_calls);
            let poller = &self.poller;
            MutexGuard::unlocked(entries, || {
                poller.lock().wait(prep.poll_items_mut(), timeout)
            })?;

            let now = Instant::now();
            let fired = prep
                .poll_items()
                .iter()
                .enumerate()
                .skip(1)
                .filter(|(_, item)| !item.readiness.is_empty())
                .map(|(index, _)| Selection::PollItem(index));
            let expired = prep
                .deadlines()
                .iter()
                .enumerate()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(index, _)| Selection::Timer(index));
            let selections: SmallVec<[Selection; 8]> = fired.chain(expired).collect();

            let mut dispatched: SmallVec<[bool; 16]> = SmallVec::from_elem(false, entries.len());
            for selection in selections {
                let Some(owner) = locate_owner(entries.as_slice(), selection) else {
                    continue;
                };
                if dispatched[owner] {
                    continue;
                }
                dispatched[owner] = true;
                StatCounters::bump(&self.stats.dispatches);
                let ctx = FinishContext::new(prep, selection);
                if entries[owner].hosted.finish_wait(&ctx) {
                    finished.push(owner);
                }
            }
            if finished.is_empty() {
                StatCounters::bump(&self.stats.spurious_wakes);
            }
        }

        finished.sort_unstable();
        for index in finished.into_iter().rev() {
            let entry = entries.remove(index);
            if entry.hosted.core().detach() {
                StatCounters::bump(&self.stats.completions);
                debug!(runner = %self.config.name, handle = entry.hosted.core().id(), "task completed");
            }
        }
        Ok(())
    }

    fn shutdown(&self) {
        let pending = {
            let mut inbox = self.inbox.lock();
            inbox.closed = true;
            std::mem::take(&mut inbox.pending)
        };
        let entries = std::mem::take(&mut *self.entries.lock());
        let count = pending.len() + entries.len();
        for hosted in entries.into_iter().map(|entry| entry.hosted).chain(pending) {
            if hosted.core().is_detached() {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| hosted.cancel_and_wait())).is_err() {
                warn!(runner = %self.config.name, handle = hosted.core().id(), "teardown cancellation panicked");
            }
            hosted.core().detach();
        }
        debug!(runner = %self.config.name, cancelled = count, "runner shut down");
    }
}

/// Finds the entry whose memento owns `selection`.
///
/// Mementos are registered in order, so range ends never decrease across
/// entries and the first entry ending past the index is the only candidate.
fn locate_owner(entries: &[Entry], selection: Selection) -> Option<usize> {
    let (index, owns) = match selection {
        Selection::PollItem(i) => (
            entries.partition_point(|entry| entry.memento.poll_range().end <= i),
            i,
        ),
        Selection::Timer(i) => (
            entries.partition_point(|entry| entry.memento.timer_range().end <= i),
            i,
        ),
        Selection::Finished => return None,
    };
    let entry = entries.get(index)?;
    let range = match selection {
        Selection::PollItem(_) => entry.memento.poll_range(),
        _ => entry.memento.timer_range(),
    };
    range.contains(&owns).then_some(index)
}

/// A reactor that drives submitted tasks to completion.
///
/// `Runner` is `Send + Sync`: any thread may [`submit`](Self::submit) to it,
/// but only one thread drives it at a time. Dropping the runner cancels every
/// task still in flight at [`CancelLevel::Kill`](crate::CancelLevel::Kill)
/// and blocks until each has reached a terminal state.
pub struct Runner {
    shared: Arc<RunnerShared>,
}

impl Runner {
    /// Creates a runner with the default configuration.
    pub fn new() -> Result<Self> {
        RunnerBuilder::new().build()
    }

    /// Returns a builder for a custom runner.
    #[must_use]
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    pub(crate) fn with_parts(config: RunnerConfig, poller: Box<dyn Poller>) -> Result<Self> {
        let thread = config.associate_thread.then(|| thread::current().id());
        let shared = Arc::new(RunnerShared {
            entries: Mutex::new(Vec::new()),
            inbox: Mutex::new(Inbox::default()),
            wake: Event::new(),
            poller: Mutex::new(poller),
            thread: Mutex::new(thread),
            driving: AtomicBool::new(false),
            stats: StatCounters::default(),
            config,
        });
        shared.wake.raw_fd()?;
        debug!(runner = %shared.config.name, "runner created");
        Ok(Self { shared })
    }

    /// Returns the runner's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Returns the runner's configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.shared.config
    }

    /// Returns a cloneable handle for submitting from other threads.
    #[must_use]
    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Hands `task` to the runner and returns its handle.
    ///
    /// Callable from any thread; wakes the runner if it is blocked in the OS
    /// wait. A task that is already resolved is done immediately.
    ///
    /// # Panics
    ///
    /// Panics if `task` is empty.
    pub fn submit<T: Send + 'static>(&self, task: Task<T>) -> PreparedTask<T> {
        self.shared.submit(task)
    }

    /// Drives the reactor until `target` is done.
    ///
    /// Other submitted tasks make progress along the way and may stay in
    /// flight afterwards. Fails with [`ErrorKind::WrongThread`](crate::ErrorKind)
    /// if another thread is bound to the runner, and with
    /// [`ErrorKind::InvalidArgument`](crate::ErrorKind) if `target` belongs to
    /// a different runner.
    pub fn run_until<T: Send + 'static>(&self, target: &PreparedTask<T>) -> Result<()> {
        if target.is_done() {
            return Ok(());
        }
        let _binding = self.shared.bind_current_thread()?;
        match target.core().runner() {
            Some(runner) if Arc::ptr_eq(&runner, &self.shared) => {}
            _ if target.is_done() => return Ok(()),
            _ => {
                return Err(Error::invalid_argument(
                    "task is not hosted by this runner",
                ));
            }
        }
        self.shared.drive(target.core())
    }

    /// Submits `task`, drives the reactor until it is done, and returns its
    /// result.
    pub fn run<T: Send + 'static>(&self, task: Task<T>) -> Result<T> {
        let binding = self.shared.bind_current_thread()?;
        let target = self.shared.submit(task);
        if let Err(err) = self.shared.drive(target.core()) {
            drop(binding);
            let _ = target.cancel_and_wait();
            return Err(err);
        }
        drop(binding);
        target
            .take_result()
            .unwrap_or_else(|| Err(Error::internal("runner stopped before the task finished")))
    }

    /// Binds the runner to the calling thread.
    pub fn associate_current_thread(&self) -> Result<()> {
        let current = thread::current().id();
        let mut bound = self.shared.thread.lock();
        match *bound {
            Some(id) if id != current => Err(Error::wrong_thread(format!(
                "runner {:?} is bound to another thread",
                self.shared.config.name
            ))),
            _ => {
                *bound = Some(current);
                Ok(())
            }
        }
    }

    /// Returns the number of tasks in flight or waiting to be absorbed.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let queued = self
            .shared
            .inbox
            .lock()
            .pending
            .iter()
            .filter(|hosted| !hosted.core().is_detached())
            .count();
        let in_flight = self
            .shared
            .entries
            .lock()
            .iter()
            .filter(|entry| !entry.hosted.core().is_detached())
            .count();
        queued + in_flight
    }

    /// Returns a snapshot of the runner's counters.
    #[must_use]
    pub fn stats(&self) -> RunnerStats {
        self.shared.stats.snapshot()
    }

    /// Renders every in-flight task's wait state as text.
    #[must_use]
    pub fn dbg_print(&self) -> String {
        let mut d = Describe::new();
        d.line(format_args!("runner {:?}", self.shared.config.name));
        d.nested(|d| {
            match self.shared.entries.try_lock() {
                Some(entries) => {
                    for entry in entries.iter() {
                        entry.hosted.describe(d);
                    }
                }
                None => d.line("<driving>"),
            }
            for hosted in &self.shared.inbox.lock().pending {
                hosted.describe(d);
            }
        });
        d.finish()
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl core::fmt::Debug for Runner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.shared.config.name)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// A cloneable, sendable handle for submitting work to a [`Runner`].
///
/// Submitting after the runner has been dropped cancels the task immediately.
#[derive(Clone)]
pub struct RunnerHandle {
    shared: Arc<RunnerShared>,
}

impl RunnerHandle {
    /// Hands `task` to the runner. See [`Runner::submit`].
    pub fn submit<T: Send + 'static>(&self, task: Task<T>) -> PreparedTask<T> {
        self.shared.submit(task)
    }

    /// Wakes the runner if it is blocked in the OS wait.
    pub fn wake(&self) {
        self.shared.wake();
    }

    /// Returns the runner's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }
}

impl core::fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("name", &self.shared.config.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{init_test_logging, recording_runner};
    use crate::types::CancelLevel;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    #[test]
    fn resolved_task_never_waits() {
        init_test("resolved_task_never_waits");
        let (runner, waits) = recording_runner();
        let value = runner
            .run(Task::value(3).then(|n| Task::value(n + 1)))
            .expect("run failed");
        assert_eq!(value, 4);
        assert!(waits.is_empty());
        assert_eq!(runner.stats().iterations, 0);
        crate::test_complete!("resolved_task_never_waits");
    }

    #[test]
    fn yield_uses_fast_pass() {
        init_test("yield_uses_fast_pass");
        let (runner, waits) = recording_runner();
        runner.run(crate::time::yield_now()).expect("run failed");
        let stats = runner.stats();
        assert_eq!(stats.fast_passes, 1);
        assert_eq!(stats.wait_calls, 0);
        assert!(waits.is_empty());
        crate::test_complete!("yield_uses_fast_pass");
    }

    #[test]
    fn sleep_issues_one_wait_per_iteration() {
        init_test("sleep_issues_one_wait_per_iteration");
        let (runner, waits) = recording_runner();
        let started = Instant::now();
        runner
            .run(crate::time::sleep(Duration::from_millis(20)))
            .expect("run failed");
        assert!(started.elapsed() >= Duration::from_millis(20));
        let stats = runner.stats();
        assert_eq!(stats.wait_calls, stats.iterations - stats.fast_passes);
        assert_eq!(waits.len() as u64, stats.wait_calls);
        crate::test_complete!("sleep_issues_one_wait_per_iteration");
    }

    #[test]
    fn max_wait_caps_timeout() {
        let poller = crate::runtime::reactor::RecordingPoller::new();
        let log = poller.log();
        let runner = Runner::builder()
            .max_wait(Some(Duration::from_millis(2)))
            .poller(poller)
            .build()
            .expect("build failed");
        runner
            .run(crate::time::sleep(Duration::from_millis(10)))
            .expect("run failed");
        assert!(
            log.records()
                .iter()
                .all(|record| record.timeout <= Some(Duration::from_millis(2)))
        );
    }

    #[test]
    fn drop_cancels_in_flight_tasks() {
        init_test("drop_cancels_in_flight_tasks");
        let runner = Runner::new().expect("runner");
        let handle = runner.submit(crate::time::sleep(Duration::from_secs(60)));
        assert_eq!(runner.pending_count(), 1);
        drop(runner);
        assert!(handle.is_done());
        crate::assert_cancelled!(handle.take_result().expect("done"));
        crate::test_complete!("drop_cancels_in_flight_tasks");
    }

    #[test]
    fn submit_after_drop_cancels_immediately() {
        let runner = Runner::new().expect("runner");
        let remote = runner.handle();
        drop(runner);
        let handle = remote.submit(crate::time::sleep(Duration::from_secs(60)));
        assert!(handle.is_done());
        crate::assert_cancelled!(handle.take_result().expect("done"));
    }

    #[test]
    fn local_cancel_and_wait_detaches() {
        let runner = Runner::new().expect("runner");
        let handle = runner.submit(crate::time::sleep(Duration::from_secs(60)));
        crate::assert_cancelled!(handle.cancel_and_wait());
        assert!(handle.is_done());
        assert_eq!(runner.pending_count(), 0);
    }

    #[test]
    fn cancel_from_unbound_thread_leaves_inbox_to_the_loop() {
        init_test("cancel_from_unbound_thread_leaves_inbox_to_the_loop");
        let runner = Runner::new().expect("runner");
        let handle = runner.submit(crate::time::sleep(Duration::from_secs(60)));
        let remote = handle.clone();
        let result = std::thread::spawn(move || remote.cancel_and_wait())
            .join()
            .expect("canceller panicked");
        crate::assert_cancelled!(result);
        assert!(handle.is_done());
        // The entry is still queued; only the reactor loop removes it.
        assert_eq!(runner.shared.inbox.lock().pending.len(), 1);
        assert_eq!(runner.pending_count(), 0);

        runner.run(Task::value(())).expect("run failed");
        let pass = runner.submit(crate::time::yield_now());
        runner.run_until(&pass).expect("run_until failed");
        assert!(runner.shared.inbox.lock().pending.is_empty());
        assert!(runner.shared.entries.lock().is_empty());
        crate::test_complete!("cancel_from_unbound_thread_leaves_inbox_to_the_loop");
    }

    #[test]
    fn driving_thread_is_local_and_others_are_not() {
        let runner = Runner::builder()
            .associate_thread(true)
            .build()
            .expect("runner");
        assert!(runner.shared.is_local());
        std::thread::scope(|scope| {
            let foreign = scope.spawn(|| runner.shared.is_local()).join();
            assert!(!foreign.expect("thread panicked"));
        });
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let a = Runner::new().expect("runner");
        let b = Runner::new().expect("runner");
        let handle = a.submit(crate::time::sleep(Duration::from_secs(60)));
        let err = b.run_until(&handle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        handle.request_cancel(CancelLevel::Kill);
        a.run_until(&handle).expect("run_until failed");
        assert!(handle.is_done());
    }

    #[test]
    fn associated_runner_rejects_other_threads() {
        let runner = Runner::builder()
            .associate_thread(true)
            .build()
            .expect("runner");
        std::thread::scope(|scope| {
            let result = scope
                .spawn(|| runner.run(Task::value(1)))
                .join()
                .expect("thread panicked");
            assert_eq!(result.unwrap_err().kind(), ErrorKind::WrongThread);
        });
        assert_eq!(runner.run(Task::value(1)).expect("run failed"), 1);
    }

    #[test]
    fn dbg_print_lists_tasks() {
        let runner = Runner::builder().name("dbg").build().expect("runner");
        let _handle = runner.submit(crate::time::sleep(Duration::from_secs(60)));
        let dump = runner.dbg_print();
        assert!(dump.starts_with("runner \"dbg\""));
        assert!(dump.contains("prepared #"));
    }
}
