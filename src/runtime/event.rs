//! A one-bit signal that can be both blocked on and polled.
//!
//! [`Event`] backs the runner's wake descriptor, the completion signal of
//! prepared tasks, and channel readiness. Threads block on it through a
//! condition variable; reactors watch it through a descriptor that is
//! readable exactly while the event is set.
//!
//! The descriptor is a nonblocking socket pair created on first use, so an
//! event that is never polled costs no file descriptors.

use parking_lot::{Condvar, Mutex};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pipe {
    reader: UnixStream,
    writer: UnixStream,
}

impl Pipe {
    fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self { reader, writer })
    }

    fn signal(&self) {
        // A full buffer already reads as ready.
        let _ = (&self.writer).write(&[1]);
    }

    fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            match (&self.reader).read(&mut buf) {
                Ok(n) if n == buf.len() => {}
                _ => break,
            }
        }
    }
}

#[derive(Debug, Default)]
struct EventState {
    set: bool,
    pipe: Option<Pipe>,
}

/// A manual-reset event.
#[derive(Debug, Default)]
pub struct Event {
    state: Mutex<EventState>,
    cond: Condvar,
}

impl Event {
    /// Creates an unset event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event, waking blocked threads and reactors.
    ///
    /// Returns `true` if the event was not already set.
    pub fn set(&self) -> bool {
        let mut state = self.state.lock();
        if state.set {
            return false;
        }
        state.set = true;
        if let Some(pipe) = &state.pipe {
            pipe.signal();
        }
        drop(state);
        self.cond.notify_all();
        true
    }

    /// Clears the event.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if !state.set {
            return;
        }
        state.set = false;
        if let Some(pipe) = &state.pipe {
            pipe.drain();
        }
    }

    /// Returns true if the event is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.lock().set
    }

    /// Blocks until the event is set.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.set {
            self.cond.wait(&mut state);
        }
    }

    /// Blocks until the event is set or `timeout` elapses.
    ///
    /// Returns `true` if the event is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.set {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.set;
            }
        }
        true
    }

    /// Returns a descriptor that is readable while the event is set.
    ///
    /// The descriptor stays valid for the lifetime of the event.
    pub fn raw_fd(&self) -> io::Result<RawFd> {
        let mut state = self.state.lock();
        if state.pipe.is_none() {
            let pipe = Pipe::new()?;
            if state.set {
                pipe.signal();
            }
            state.pipe = Some(pipe);
        }
        Ok(state
            .pipe
            .as_ref()
            .map_or(-1, |pipe| pipe.reader.as_raw_fd()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::reactor::{Interest, PollItem, Poller, Readiness, SysPoller};
    use std::sync::Arc;

    fn readable(fd: RawFd) -> bool {
        let mut items = [PollItem::new(fd, Interest::READABLE)];
        SysPoller::new()
            .wait(&mut items, Some(Duration::ZERO))
            .expect("poll failed");
        items[0].readiness.contains(Readiness::READABLE)
    }

    #[test]
    fn descriptor_follows_state() {
        let event = Event::new();
        let fd = event.raw_fd().expect("raw_fd failed");
        assert!(!readable(fd));

        assert!(event.set());
        assert!(!event.set());
        assert!(readable(fd));

        event.reset();
        assert!(!event.is_set());
        assert!(!readable(fd));
    }

    #[test]
    fn lazily_created_descriptor_reflects_prior_set() {
        let event = Event::new();
        event.set();
        let fd = event.raw_fd().expect("raw_fd failed");
        assert!(readable(fd));
        assert_eq!(event.raw_fd().expect("raw_fd failed"), fd);
    }

    #[test]
    fn wakes_blocked_thread() {
        let event = Arc::new(Event::new());
        let setter = Arc::clone(&event);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.set();
        });
        event.wait();
        assert!(event.is_set());
        handle.join().expect("setter panicked");
    }

    #[test]
    fn wait_timeout_expires() {
        let event = Event::new();
        assert!(!event.wait_timeout(Duration::from_millis(5)));
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(5)));
    }
}
