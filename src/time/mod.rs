//! Timers and yielding.
//!
//! Timers register absolute deadlines with the reactor; the runner bounds its
//! OS wait by the earliest one and finishes every timer whose deadline passed.

mod sleep;
mod yield_now;

pub use sleep::{sleep, sleep_until, with_timeout};
pub use yield_now::yield_now;
