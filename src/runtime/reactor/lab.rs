//! Recording poller for tests.
//!
//! [`RecordingPoller`] performs real waits through [`SysPoller`] and appends a
//! [`WaitRecord`] for each call to a shared [`WaitLog`]. Tests use the log to
//! check how many OS waits a run issued and what each one was asked to do.
//!
//! # Example
//!
//! ```ignore
//! use stagehand::runtime::reactor::RecordingPoller;
//! use stagehand::{Runner, Task};
//!
//! let poller = RecordingPoller::new();
//! let log = poller.log();
//! let runner = Runner::builder().poller(poller).build()?;
//! runner.run(Task::value(()))?;
//! assert!(log.is_empty());
//! ```

use super::{PollItem, Poller, SysPoller};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// One OS wait as seen by [`RecordingPoller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitRecord {
    /// Number of descriptors in the list, including the runner's wake descriptor.
    pub items: usize,
    /// Timeout passed to the wait.
    pub timeout: Option<Duration>,
    /// Number of descriptors that fired.
    pub fired: usize,
}

/// Shared, append-only log of waits.
#[derive(Debug, Clone, Default)]
pub struct WaitLog {
    records: Arc<Mutex<Vec<WaitRecord>>>,
}

impl WaitLog {
    /// Returns the number of recorded waits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if no wait was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Returns a copy of all records.
    #[must_use]
    pub fn records(&self) -> Vec<WaitRecord> {
        self.records.lock().clone()
    }

    /// Discards all records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, record: WaitRecord) {
        self.records.lock().push(record);
    }
}

/// A poller that records every wait.
#[derive(Debug, Default)]
pub struct RecordingPoller {
    inner: SysPoller,
    log: WaitLog,
}

impl RecordingPoller {
    /// Creates a recording poller with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to this poller's log.
    #[must_use]
    pub fn log(&self) -> WaitLog {
        self.log.clone()
    }
}

impl Poller for RecordingPoller {
    fn wait(&mut self, items: &mut [PollItem], timeout: Option<Duration>) -> io::Result<usize> {
        let fired = self.inner.wait(items, timeout)?;
        self.log.push(WaitRecord {
            items: items.len(),
            timeout,
            fired,
        });
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_wait() {
        let mut poller = RecordingPoller::new();
        let log = poller.log();
        poller
            .wait(&mut [], Some(Duration::ZERO))
            .expect("poll failed");
        poller
            .wait(&mut [], Some(Duration::from_millis(1)))
            .expect("poll failed");

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timeout, Some(Duration::ZERO));
        assert_eq!(records[1].fired, 0);

        log.clear();
        assert!(log.is_empty());
    }
}
