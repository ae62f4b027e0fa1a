//! `poll(2)` backend.
//!
//! NOTE: This module uses unsafe to call `poll` and to borrow raw
//! descriptors for `nix`'s `read`/`write`. The safety invariants are
//! documented inline.

#![allow(unsafe_code)]

use super::{Interest, PollItem, Poller, Readiness};
use nix::errno::Errno;
use nix::unistd;
use std::io;
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Poller backed by `poll(2)`.
///
/// The `pollfd` buffer is reused across waits.
#[derive(Debug, Default)]
pub struct SysPoller {
    fds: Vec<libc::pollfd>,
}

impl SysPoller {
    /// Creates a new poller.
    #[must_use]
    pub fn new() -> Self {
        Self { fds: Vec::new() }
    }
}

fn interest_to_events(interest: Interest) -> libc::c_short {
    let mut events: libc::c_short = 0;
    if interest.is_readable() {
        events |= libc::POLLIN;
    }
    if interest.is_writable() {
        events |= libc::POLLOUT;
    }
    if interest.contains(Interest::PRIORITY) {
        events |= libc::POLLPRI;
    }
    events
}

fn revents_to_readiness(revents: libc::c_short) -> Readiness {
    let mut readiness = Readiness::EMPTY;
    if revents & libc::POLLIN != 0 {
        readiness |= Readiness::READABLE;
    }
    if revents & libc::POLLOUT != 0 {
        readiness |= Readiness::WRITABLE;
    }
    if revents & libc::POLLPRI != 0 {
        readiness |= Readiness::PRIORITY;
    }
    if revents & libc::POLLERR != 0 {
        readiness |= Readiness::ERROR;
    }
    if revents & libc::POLLHUP != 0 {
        readiness |= Readiness::HANGUP;
    }
    if revents & libc::POLLNVAL != 0 {
        readiness |= Readiness::INVALID;
    }
    readiness
}

/// Converts a timeout to whole milliseconds, rounding up so that a wait never
/// returns before the deadline that produced it.
fn timeout_to_millis(timeout: Option<Duration>) -> libc::c_int {
    let Some(timeout) = timeout else {
        return -1;
    };
    let mut millis = timeout.as_millis();
    if Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX)) < timeout {
        millis += 1;
    }
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}

impl Poller for SysPoller {
    fn wait(&mut self, items: &mut [PollItem], timeout: Option<Duration>) -> io::Result<usize> {
        self.fds.clear();
        self.fds.extend(items.iter_mut().map(|item| {
            item.readiness = Readiness::EMPTY;
            libc::pollfd {
                fd: item.fd,
                events: interest_to_events(item.interest),
                revents: 0,
            }
        }));

        let nfds = libc::nfds_t::try_from(self.fds.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many descriptors"))?;
        // SAFETY: `fds` is a live, exclusively borrowed buffer of `nfds` pollfd structs.
        let rc = unsafe { libc::poll(self.fds.as_mut_ptr(), nfds, timeout_to_millis(timeout)) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        let mut fired = 0;
        for (item, pfd) in items.iter_mut().zip(&self.fds) {
            item.readiness = revents_to_readiness(pfd.revents);
            if !item.readiness.is_empty() {
                fired += 1;
            }
        }
        Ok(fired)
    }
}

/// Borrows a raw descriptor for the length of one syscall.
fn borrow(fd: RawFd) -> io::Result<BorrowedFd<'static>> {
    if fd < 0 {
        return Err(Errno::EBADF.into());
    }
    // SAFETY: callers keep `fd` open while the returned borrow is in use, and
    // the borrow never outlives the read or write it was taken for.
    Ok(unsafe { BorrowedFd::borrow_raw(fd) })
}

/// Reads from a raw descriptor, retrying on `EINTR`.
pub(crate) fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let fd = borrow(fd)?;
    loop {
        match unistd::read(fd, buf) {
            Ok(n) => return Ok(n),
            Err(Errno::EINTR) => {}
            Err(errno) => return Err(errno.into()),
        }
    }
}

/// Writes to a raw descriptor, retrying on `EINTR`.
pub(crate) fn write_fd(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let fd = borrow(fd)?;
    loop {
        match unistd::write(fd, buf) {
            Ok(n) => return Ok(n),
            Err(Errno::EINTR) => {}
            Err(errno) => return Err(errno.into()),
        }
    }
}
