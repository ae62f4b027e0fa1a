//! Reactor benchmark suite for stagehand.
//!
//! Benchmarks the costs that dominate a cooperative reactor:
//! - Fast passes (tasks that finish without an OS wait)
//! - Wide joins prepared and finished in one pass
//! - Deadline waits through the real poller
//! - Synchronous chains collapsing inside loops
//! - Channel ping-pong through descriptor wakeups
//!
//! Run:
//!   cargo bench --bench reactor_benchmark

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use stagehand::time::{sleep, yield_now};
use stagehand::{CancelLevel, Channel, Runner, Step, Task, join, join_all, loop_with};
use std::hint::black_box;
use std::time::Duration;

// =============================================================================
// FAST PASS
// =============================================================================

fn bench_fast_pass(c: &mut Criterion) {
    let runner = Runner::new().expect("runner");
    c.bench_function("reactor/yield_now", |b| {
        b.iter(|| runner.run(yield_now()).expect("yield failed"))
    });
    c.bench_function("reactor/resolved_chain", |b| {
        b.iter(|| {
            let task = Task::value(black_box(1_u64))
                .then(|n| Task::value(n + 1))
                .map(|n| n * 2);
            runner.run(task).expect("chain failed")
        })
    });
}

// =============================================================================
// WIDE JOINS
// =============================================================================

fn bench_wide_join(c: &mut Criterion) {
    let runner = Runner::new().expect("runner");
    let mut group = c.benchmark_group("reactor/join_yields");
    for width in [1_usize, 16, 256, 4096] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let values = runner
                    .run(join_all((0..width).map(|_| yield_now())))
                    .expect("join failed");
                black_box(values.len())
            })
        });
    }
    group.finish();
}

// =============================================================================
// TIMERS
// =============================================================================

fn bench_timers(c: &mut Criterion) {
    let runner = Runner::new().expect("runner");
    let mut group = c.benchmark_group("reactor/timers");
    group.sample_size(20);
    group.bench_function("sleep_100us", |b| {
        b.iter(|| runner.run(sleep(Duration::from_micros(100))).expect("sleep failed"))
    });
    group.bench_function("many_expired_timers", |b| {
        b.iter(|| {
            runner
                .run(join_all((0..64).map(|_| sleep(Duration::ZERO))))
                .expect("join failed")
        })
    });
    group.finish();
}

// =============================================================================
// LOOPS
// =============================================================================

fn bench_sync_loop(c: &mut Criterion) {
    c.bench_function("reactor/loop_sync_1000", |b| {
        b.iter(|| {
            let mut task = loop_with(Task::value(0_u32), 0_u64, CancelLevel::Quit, |n, sum, _| {
                *sum += u64::from(n);
                if n == 1000 {
                    Step::Stop
                } else {
                    Step::Continue(Task::value(n + 1))
                }
            });
            black_box(task.take_result())
        })
    });
}

// =============================================================================
// CHANNELS
// =============================================================================

fn bench_channel_ping_pong(c: &mut Criterion) {
    let runner = Runner::new().expect("runner");
    c.bench_function("reactor/channel_ping_pong_100", |b| {
        b.iter(|| {
            let channel = Channel::bounded(1).expect("channel");
            let tx = channel.clone();
            let producer = loop_with(Task::value(()), 0_u32, CancelLevel::Quit, move |(), sent, _| {
                if *sent == 100 {
                    return Step::Stop;
                }
                *sent += 1;
                Step::Continue(tx.send(*sent))
            });
            let rx = channel.clone();
            let consumer = loop_with(rx.receive(), 0_u32, CancelLevel::Quit, move |_, got, _| {
                *got += 1;
                if *got == 100 {
                    Step::Stop
                } else {
                    Step::Continue(rx.receive())
                }
            });
            runner.run(join(producer, consumer)).expect("ping-pong failed")
        })
    });
}

criterion_group!(
    benches,
    bench_fast_pass,
    bench_wide_join,
    bench_timers,
    bench_sync_loop,
    bench_channel_ping_pong
);
criterion_main!(benches);
