//! End-to-end reactor tests: one OS wait per pass, deadlines, and descriptors.

mod common;

use common::*;
use stagehand::io::{read_some, write_all};
use stagehand::time::{sleep, sleep_until, yield_now};
use stagehand::{CancelLevel, ErrorKind, Runner, Task, join, join_all, race};
use parking_lot::Mutex;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn delayed_write_wakes_reader() {
    init_test("delayed_write_wakes_reader");
    let (runner, waits) = recording_runner();
    let (reader, mut writer) = socket_pair();

    let delay = Duration::from_millis(30);
    let feeder = std::thread::spawn(move || {
        std::thread::sleep(delay);
        writer.write_all(b"ping").expect("write failed");
        writer
    });

    let started = Instant::now();
    let bytes = runner
        .run(read_some(reader.as_raw_fd(), 16))
        .expect("read failed");
    let elapsed = started.elapsed();
    let _writer = feeder.join().expect("feeder panicked");

    assert_eq!(bytes, b"ping");
    assert_with_log!(
        elapsed >= delay - Duration::from_millis(5),
        "reader waited for the writer",
        delay,
        elapsed
    );
    assert_with_log!(
        elapsed < delay + Duration::from_millis(200),
        "reader woke when the write landed",
        delay,
        elapsed
    );
    let stats = runner.stats();
    assert_eq!(stats.wait_calls, stats.iterations - stats.fast_passes);
    assert_eq!(waits.len() as u64, stats.wait_calls);
    for record in waits.records() {
        assert_eq!(record.timeout, None, "no timer or watchdog was armed");
    }
    test_complete!("delayed_write_wakes_reader", waits = waits.len());
}

#[test]
fn waits_list_wake_descriptor_and_reader() {
    init_test("waits_list_wake_descriptor_and_reader");
    let (runner, waits) = recording_runner();
    let (reader, writer) = socket_pair();
    let task = join(
        read_some(reader.as_raw_fd(), 8),
        sleep(Duration::from_millis(5)).then(move |()| {
            let fd = writer.as_raw_fd();
            write_all(fd, b"x".to_vec()).keep_alive(writer)
        }),
    );
    let (bytes, written) = runner.run(task).expect("join failed");
    assert_eq!(bytes, b"x");
    assert_eq!(written, 1);
    assert!(!waits.is_empty());
    for record in waits.records() {
        assert!(record.items >= 2, "record = {record:?}");
    }
    test_complete!("waits_list_wake_descriptor_and_reader");
}

#[test]
fn joined_readers_share_one_wait_per_pass() {
    const READERS: usize = 4;
    init_test("joined_readers_share_one_wait_per_pass");
    let (runner, waits) = recording_runner();
    assert_eq!(runner.config().max_wait, None);
    let pairs: Vec<_> = (0..READERS).map(|_| socket_pair()).collect();
    let readers = pairs
        .iter()
        .map(|(reader, _)| read_some(reader.as_raw_fd(), 8));

    let delay = Duration::from_millis(20);
    let writers: Vec<_> = pairs
        .iter()
        .map(|(_, writer)| writer.try_clone().expect("clone failed"))
        .collect();
    let feeder = std::thread::spawn(move || {
        std::thread::sleep(delay);
        for mut writer in writers {
            writer.write_all(b"go").expect("write failed");
        }
    });

    let started = Instant::now();
    let results = runner.run(join_all(readers)).expect("join failed");
    let elapsed = started.elapsed();
    feeder.join().expect("feeder panicked");

    assert_eq!(results, vec![b"go".to_vec(); READERS]);
    assert!(elapsed < delay + Duration::from_millis(200), "elapsed = {elapsed:?}");
    let stats = runner.stats();
    let records = waits.records();
    assert_eq!(records.len() as u64, stats.iterations - stats.fast_passes);
    assert!(records.len() <= READERS + 1, "records = {records:?}");
    let first = records.first().expect("at least one wait");
    // The wake descriptor plus every reader, in a single wait.
    assert_eq!(first.items, READERS + 1, "record = {first:?}");
    for record in &records {
        assert!(record.items <= READERS + 1, "record = {record:?}");
        assert_eq!(record.timeout, None, "record = {record:?}");
    }
    test_complete!("joined_readers_share_one_wait_per_pass", waits = records.len());
}

#[test]
fn sleeps_finish_in_deadline_order() {
    init_test("sleeps_finish_in_deadline_order");
    let runner = Runner::new().expect("runner");
    let order = Arc::new(Mutex::new(Vec::new()));
    let tasks = [30_u64, 10, 20].map(|ms| {
        let order = Arc::clone(&order);
        sleep(Duration::from_millis(ms)).map(move |()| order.lock().push(ms))
    });
    runner.run(join_all(tasks)).expect("join failed");
    assert_eq!(*order.lock(), vec![10, 20, 30]);
    test_complete!("sleeps_finish_in_deadline_order");
}

#[test]
fn multiple_expired_timers_finish_in_one_pass() {
    init_test("multiple_expired_timers_finish_in_one_pass");
    let (runner, _waits) = recording_runner();
    let deadline = Instant::now() + Duration::from_millis(10);
    let tasks = (0..4).map(|_| sleep_until(deadline));
    runner.run(join_all(tasks)).expect("join failed");
    let stats = runner.stats();
    // One wait for the shared deadline; every timer dispatches after it.
    assert!(stats.wait_calls <= 2, "wait_calls = {}", stats.wait_calls);
    test_complete!("multiple_expired_timers_finish_in_one_pass");
}

#[test]
fn fast_pass_skips_the_os_wait() {
    init_test("fast_pass_skips_the_os_wait");
    let (runner, waits) = recording_runner();
    let sleeper = runner.submit(sleep(Duration::from_secs(60)));
    runner.run(yield_now()).expect("yield failed");
    assert!(waits.is_empty());
    assert_eq!(runner.stats().fast_passes, 1);
    assert_cancelled!(sleeper.cancel_and_wait());
    test_complete!("fast_pass_skips_the_os_wait");
}

#[test]
fn race_timeout_against_silent_descriptor() {
    init_test("race_timeout_against_silent_descriptor");
    let runner = Runner::new().expect("runner");
    let (reader, _writer) = socket_pair();
    let task = race([
        read_some(reader.as_raw_fd(), 8).map(|_| "read"),
        sleep(Duration::from_millis(10)).map(|()| "timeout"),
    ]);
    assert_eq!(runner.run(task).expect("race failed"), "timeout");
    test_complete!("race_timeout_against_silent_descriptor");
}

#[test]
fn run_propagates_task_errors() {
    let runner = Runner::new().expect("runner");
    let task = yield_now().then(|()| Task::<u8>::error(stagehand::Error::msg("broken")));
    let err = runner.run(task).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.message(), Some("broken"));
}

#[test]
fn panicking_operation_becomes_error() {
    let runner = Runner::new().expect("runner");
    let task = yield_now().then(|()| -> Task<u8> { panic!("task blew up") });
    let err = runner.run(task).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Panicked);
}

#[test]
fn other_tasks_progress_during_run() {
    init_test("other_tasks_progress_during_run");
    let runner = Runner::new().expect("runner");
    let background = runner.submit(sleep(Duration::from_millis(5)).map(|()| 11));
    runner
        .run(sleep(Duration::from_millis(30)))
        .expect("sleep failed");
    assert!(background.is_done());
    assert_eq!(background.take_result().expect("done").expect("value"), 11);
    test_complete!("other_tasks_progress_during_run");
}

#[test]
fn requested_cancel_reaches_submitted_task() {
    let runner = Runner::new().expect("runner");
    let handle = runner.submit(sleep(Duration::from_secs(60)));
    handle.request_cancel(CancelLevel::Quit);
    runner.run_until(&handle).expect("run_until failed");
    let err = handle.take_result().expect("done").unwrap_err();
    assert_eq!(err.cancel_level(), Some(CancelLevel::Quit));
}
