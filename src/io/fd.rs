//! Descriptor readiness and nonblocking transfers.

use crate::combinator::{Iteration, iterate};
use crate::error::Error;
use crate::runtime::reactor::{Interest, Readiness, read_fd, write_fd};
use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::types::{CancelLevel, CancelState};
use std::io;
use std::os::unix::io::RawFd;
use std::task::Poll;

struct WaitFd<F> {
    fd: RawFd,
    interest: Interest,
    keep_waiting: F,
    applied: CancelState,
}

impl<F> WaitFd<F>
where
    F: Fn(CancelLevel) -> bool,
{
    fn gave_up(&self) -> bool {
        !(self.keep_waiting)(self.applied.applied())
    }
}

impl<F> PendingOp<Readiness> for WaitFd<F>
where
    F: Fn(CancelLevel) -> bool + Send + 'static,
{
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        if self.gave_up() {
            ctx.set_finished();
        } else {
            ctx.add_poll_item(self.fd, self.interest);
        }
    }

    fn finish_wait(&mut self, ctx: &FinishContext<'_>) -> Poll<Task<Readiness>> {
        if self.gave_up() {
            return Poll::Ready(Task::error(Error::cancelled(self.applied.applied())));
        }
        match ctx.readiness() {
            Some(readiness) if readiness.contains(Readiness::INVALID) => Poll::Ready(Task::error(
                Error::io(io::Error::from_raw_os_error(libc::EBADF)),
            )),
            Some(readiness) if !readiness.is_empty() => Poll::Ready(Task::value(readiness)),
            _ => Poll::Pending,
        }
    }

    fn cancel_and_wait(&mut self) -> Task<Readiness> {
        Task::error(Error::cancelled(CancelLevel::Kill))
    }

    fn describe(&self, d: &mut Describe) {
        d.line(format_args!("fd {} {:?}", self.fd, self.interest));
    }
}

/// Waits until `fd` reports readiness for `interest`.
///
/// `keep_waiting` is consulted with the current cancel level on every pass;
/// once it returns false the wait resolves to a cancellation error. Hangup
/// and error conditions resolve the wait with the reported flags. A
/// descriptor the OS rejects as invalid fails with an I/O error.
///
/// The descriptor is borrowed: the caller keeps it open until the task
/// resolves.
pub fn wait_fd<F>(fd: RawFd, interest: Interest, keep_waiting: F) -> Task<Readiness>
where
    F: Fn(CancelLevel) -> bool + Send + 'static,
{
    Task::from_op(WaitFd {
        fd,
        interest,
        keep_waiting,
        applied: CancelState::new(),
    })
}

fn below_quit(level: CancelLevel) -> bool {
    level < CancelLevel::Quit
}

/// Waits until `fd` is readable, giving up at [`CancelLevel::Quit`].
pub fn readable(fd: RawFd) -> Task<Readiness> {
    wait_fd(fd, Interest::READABLE, below_quit)
}

/// Waits until `fd` is writable, giving up at [`CancelLevel::Quit`].
pub fn writable(fd: RawFd) -> Task<Readiness> {
    wait_fd(fd, Interest::WRITABLE, below_quit)
}

/// Reads at most `max` bytes from a nonblocking descriptor.
///
/// Tries the read right away and only waits for readability when the
/// descriptor would block. Resolves to an empty buffer at end of stream.
pub fn read_some(fd: RawFd, max: usize) -> Task<Vec<u8>> {
    iterate(move |_: Option<Readiness>, _| {
        let mut buf = vec![0; max];
        match read_fd(fd, &mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Iteration::Done(Task::value(buf))
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Iteration::Next(readable(fd)),
            Err(err) => Iteration::Done(Task::error(Error::io(err))),
        }
    })
}

/// Writes all of `bytes` to a nonblocking descriptor.
///
/// Writes as much as the descriptor accepts, waiting for writability in
/// between, and resolves to the number of bytes written. Cancellation while
/// waiting leaves a partial write behind.
pub fn write_all(fd: RawFd, bytes: impl Into<Vec<u8>>) -> Task<usize> {
    let bytes = bytes.into();
    let mut written = 0;
    iterate(move |_: Option<Readiness>, _| {
        while written < bytes.len() {
            match write_fd(fd, &bytes[written..]) {
                Ok(0) => {
                    return Iteration::Done(Task::error(Error::io(io::Error::from(
                        io::ErrorKind::WriteZero,
                    ))));
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return Iteration::Next(writable(fd));
                }
                Err(err) => return Iteration::Done(Task::error(Error::io(err))),
            }
        }
        Iteration::Done(Task::value(written))
    })
}
