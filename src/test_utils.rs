//! Test utilities for stagehand.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Runner constructors that record every OS wait
//! - Nonblocking socket pairs for descriptor tests
//!
//! # Example
//! ```
//! use stagehand::test_utils::{init_test_logging, recording_runner};
//! use stagehand::Task;
//!
//! init_test_logging();
//! let (runner, waits) = recording_runner();
//! assert_eq!(runner.run(Task::value(1)).unwrap(), 1);
//! assert!(waits.is_empty());
//! ```

use crate::runtime::Runner;
use crate::runtime::reactor::{RecordingPoller, WaitLog};
use std::os::unix::net::UnixStream;
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Builds a runner whose OS waits are recorded.
///
/// The returned log is shared with the runner's poller.
#[must_use]
pub fn recording_runner() -> (Runner, WaitLog) {
    let poller = RecordingPoller::new();
    let log = poller.log();
    let runner = Runner::builder()
        .name("test-runner")
        .poller(poller)
        .build()
        .expect("failed to build test runner");
    (runner, log)
}

/// Creates a connected pair of nonblocking unix sockets.
#[must_use]
pub fn socket_pair() -> (UnixStream, UnixStream) {
    let (a, b) = UnixStream::pair().expect("socketpair failed");
    a.set_nonblocking(true).expect("set_nonblocking failed");
    b.set_nonblocking(true).expect("set_nonblocking failed");
    (a, b)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that a task result is a cancellation error.
#[macro_export]
macro_rules! assert_cancelled {
    ($result:expr) => {
        match $result {
            Err(err) if err.is_cancelled() => {}
            other => unreachable!("expected a cancellation error, got {:?}", other),
        }
    };
}
