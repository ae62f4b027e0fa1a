//! The single OS wait behind every reactor iteration.
//!
//! A [`Poller`] receives the flat descriptor list that all pending operations
//! registered during one preparation pass, blocks once until any of them is
//! ready or the timeout elapses, and writes back per-descriptor readiness.
//! The runner then attributes every fired index to the operation that owns it.
//!
//! # Implementations
//!
//! - [`SysPoller`]: `poll(2)` on unix targets.
//! - [`RecordingPoller`]: delegates to `SysPoller` and records every call, so
//!   tests can assert how many OS waits a run issued.
//!
//! Unlike an epoll-style reactor there is no registration state: the list is
//! rebuilt every iteration, which is what lets operations change their
//! interest freely between passes.

mod interest;
mod lab;
mod sys;

pub use interest::{Interest, Readiness};
pub use lab::{RecordingPoller, WaitLog, WaitRecord};
pub use sys::SysPoller;

pub(crate) use sys::{read_fd, write_fd};

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// One descriptor in the merged wait list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollItem {
    /// The descriptor to watch.
    pub fd: RawFd,
    /// What the owning operation wants to be woken for.
    pub interest: Interest,
    /// What the last wait reported. Cleared before every wait.
    pub readiness: Readiness,
}

impl PollItem {
    /// Creates an item with empty readiness.
    #[must_use]
    pub const fn new(fd: RawFd, interest: Interest) -> Self {
        Self {
            fd,
            interest,
            readiness: Readiness::EMPTY,
        }
    }
}

/// Blocks on a list of descriptors.
///
/// Implementations must clear the readiness of every item before waiting and
/// set it for the items that fired. A wait interrupted by a signal reports
/// zero fired items rather than an error.
pub trait Poller: Send {
    /// Waits until an item is ready or `timeout` elapses.
    ///
    /// `None` waits indefinitely. Returns the number of items with non-empty
    /// readiness.
    fn wait(&mut self, items: &mut [PollItem], timeout: Option<Duration>) -> io::Result<usize>;
}

impl<P: Poller + ?Sized> Poller for Box<P> {
    fn wait(&mut self, items: &mut [PollItem], timeout: Option<Duration>) -> io::Result<usize> {
        (**self).wait(items, timeout)
    }
}

/// Creates the default poller for this platform.
#[must_use]
pub fn create_poller() -> Box<dyn Poller> {
    Box::new(SysPoller::new())
}
