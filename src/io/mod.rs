//! Tasks over raw descriptors.
//!
//! These helpers wrap a single OS-level waitable descriptor. They expect the
//! descriptor to be in nonblocking mode and borrow it for the lifetime of the
//! returned task.

mod fd;

pub use fd::{read_some, readable, wait_fd, writable, write_all};
