//! Core types shared by every layer of the runtime.
//!
//! - [`cancel`]: Cancel levels, monotonic escalation tracking, and level remapping

pub mod cancel;

pub use cancel::{AtomicCancelLevel, CancelLevel, CancelRemap, CancelState};
