//! Prepared handles used across threads, and shadows between runners.

mod common;

use common::*;
use stagehand::time::{sleep, yield_now};
use stagehand::{CancelLevel, ErrorKind, Runner, Task, cancel_requested, join};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Spawns a thread that drives `runner` until `stop` is set.
fn drive_in_background(runner: Arc<Runner>, stop: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            let tick = runner.submit(sleep(Duration::from_millis(2)));
            runner.run_until(&tick).expect("run_until failed");
        }
    })
}

#[test]
fn submit_from_another_thread() {
    init_test("submit_from_another_thread");
    let runner = Runner::new().expect("runner");
    let remote = runner.handle();
    let submitter = std::thread::spawn(move || remote.submit(sleep(Duration::from_millis(5)).map(|()| 99)));
    let handle = submitter.join().expect("submitter panicked");
    runner.run_until(&handle).expect("run_until failed");
    assert_eq!(handle.take_result().expect("done").expect("value"), 99);
    test_complete!("submit_from_another_thread");
}

#[test]
fn cancel_and_wait_from_foreign_thread_blocks_until_done() {
    init_test("cancel_and_wait_from_foreign_thread_blocks_until_done");
    let runner = Arc::new(Runner::new().expect("runner"));
    let stop = Arc::new(AtomicBool::new(false));
    let handle = runner.submit(sleep(Duration::from_secs(60)));
    let driver = drive_in_background(Arc::clone(&runner), Arc::clone(&stop));

    assert!(wait_for(Duration::from_secs(5), || runner.stats().iterations > 0));
    let result = handle.cancel_and_wait();
    assert_cancelled!(result);
    assert!(handle.is_done());

    stop.store(true, Ordering::Release);
    driver.join().expect("driver panicked");
    test_complete!("cancel_and_wait_from_foreign_thread_blocks_until_done");
}

#[test]
fn blocking_wait_sees_completion() {
    let runner = Arc::new(Runner::new().expect("runner"));
    let stop = Arc::new(AtomicBool::new(false));
    let handle = runner.submit(sleep(Duration::from_millis(10)).map(|()| "done"));
    let driver = drive_in_background(Arc::clone(&runner), Arc::clone(&stop));

    assert!(handle.wait_timeout(Duration::from_secs(5)));
    assert_eq!(handle.take_result().expect("done").expect("value"), "done");
    let err = handle.take_result().expect("done").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResultTaken);

    stop.store(true, Ordering::Release);
    driver.join().expect("driver panicked");
}

#[test]
fn shadow_awaits_task_hosted_elsewhere() {
    init_test("shadow_awaits_task_hosted_elsewhere");
    let remote_runner = Arc::new(Runner::new().expect("runner"));
    let stop = Arc::new(AtomicBool::new(false));
    let remote = remote_runner.submit(sleep(Duration::from_millis(15)).map(|()| 7));
    let driver = drive_in_background(Arc::clone(&remote_runner), Arc::clone(&stop));

    let local = Runner::new().expect("runner");
    let value = local
        .run(join(remote.shadow(), yield_now()).map(|(v, ())| v * 6))
        .expect("shadow failed");
    assert_eq!(value, 42);

    stop.store(true, Ordering::Release);
    driver.join().expect("driver panicked");
    test_complete!("shadow_awaits_task_hosted_elsewhere");
}

#[test]
fn cancelling_a_shadow_cancels_the_remote_task() {
    init_test("cancelling_a_shadow_cancels_the_remote_task");
    let remote_runner = Arc::new(Runner::new().expect("runner"));
    let stop = Arc::new(AtomicBool::new(false));
    let remote = remote_runner.submit(cancel_requested(CancelLevel::Quit).then(|()| Task::value("stopped")));
    let driver = drive_in_background(Arc::clone(&remote_runner), Arc::clone(&stop));

    let local = Runner::new().expect("runner");
    let mut shadow = remote.shadow();
    shadow.request_cancel(CancelLevel::Quit);
    assert_eq!(local.run(shadow).expect("shadow failed"), "stopped");
    assert_eq!(remote.requested_cancel_level(), CancelLevel::Quit);

    stop.store(true, Ordering::Release);
    driver.join().expect("driver panicked");
    test_complete!("cancelling_a_shadow_cancels_the_remote_task");
}

#[test]
fn associated_runner_refuses_foreign_driver() {
    let runner = Arc::new(
        Runner::builder()
            .associate_thread(true)
            .build()
            .expect("runner"),
    );
    let other = Arc::clone(&runner);
    let err = std::thread::spawn(move || other.run(Task::value(1)).unwrap_err())
        .join()
        .expect("thread panicked");
    assert_eq!(err.kind(), ErrorKind::WrongThread);
}
