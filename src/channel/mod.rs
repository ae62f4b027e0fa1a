//! Rendezvous queues between tasks.
//!
//! A [`Channel`] is a FIFO queue whose send and receive operations are tasks.
//! A bounded channel makes senders wait while it is full; an unbounded one
//! only makes receivers wait. Handles are cheap clones of one shared queue
//! and may be used from any thread.
//!
//! Each channel keeps two pollable [`Event`]s mirroring its state: one is set
//! while a receive could complete, the other while a send could. Waiting
//! operations register the matching descriptor, so the reactor wakes exactly
//! when the queue changes in their favor.
//!
//! Waiting sends and receives give up once cancellation reaches
//! [`CancelLevel::Quit`], resolving to a cancellation error. A value whose
//! send gave up is dropped.
//!
//! # Example
//!
//! ```no_run
//! use stagehand::{Channel, Runner, join};
//!
//! let runner = Runner::new()?;
//! let channel = Channel::bounded(1)?;
//! let producer = channel.send(1).then({
//!     let channel = channel.clone();
//!     move |()| channel.send(2)
//! });
//! let consumer = channel.receive().then({
//!     let channel = channel.clone();
//!     move |a| channel.receive().map(move |b| a + b)
//! });
//! let ((), sum) = runner.run(join(producer, consumer))?;
//! assert_eq!(sum, 3);
//! # Ok::<(), stagehand::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::runtime::event::Event;
use crate::runtime::reactor::Interest;
use crate::runtime::{FinishContext, PrepareContext};
use crate::task::{Describe, PendingOp, Task};
use crate::tracing_compat::{trace, warn};
use crate::types::{CancelLevel, CancelState};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

/// Re-check interval for an operation whose event has no descriptor.
const FALLBACK_POLL: Duration = Duration::from_millis(5);

struct Queue<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Senders waiting for room, oldest first.
    senders: VecDeque<Waiter>,
    next_ticket: u64,
}

/// A sender parked behind a full queue.
struct Waiter {
    ticket: u64,
    /// Set while this sender may complete.
    turn: Arc<Event>,
}

struct Shared<T> {
    queue: Mutex<Queue<T>>,
    capacity: Option<usize>,
    /// Set while a receive can complete.
    readable: Event,
}

impl<T> Shared<T> {
    fn has_room(&self, queue: &Queue<T>) -> bool {
        self.capacity.is_none_or(|cap| queue.items.len() < cap)
    }

    /// Brings the receive event and every sender's turn in line with the
    /// queue. Called with the queue locked.
    ///
    /// Only the oldest waiting sender is given its turn; a closed channel
    /// releases all of them.
    fn sync_events(&self, queue: &Queue<T>) {
        if !queue.items.is_empty() || queue.closed {
            self.readable.set();
        } else {
            self.readable.reset();
        }
        if queue.closed {
            for waiter in &queue.senders {
                waiter.turn.set();
            }
        } else if let Some(head) = queue.senders.front() {
            if self.has_room(queue) {
                head.turn.set();
            } else {
                head.turn.reset();
            }
        }
    }

    /// Sends without waiting, or joins the back of the sender queue.
    ///
    /// A fresh send never overtakes a sender that is already waiting.
    fn try_send(&self, value: T) -> SendAttempt<T> {
        let mut queue = self.queue.lock();
        if queue.closed {
            return SendAttempt::Closed;
        }
        if queue.senders.is_empty() && self.has_room(&queue) {
            queue.items.push_back(value);
            self.sync_events(&queue);
            return SendAttempt::Sent;
        }
        let ticket = queue.next_ticket;
        queue.next_ticket += 1;
        let turn = Arc::new(Event::new());
        queue.senders.push_back(Waiter {
            ticket,
            turn: Arc::clone(&turn),
        });
        self.sync_events(&queue);
        SendAttempt::Queued {
            value,
            ticket,
            turn,
        }
    }

    /// Completes a queued send if `ticket` is at the head and there is room.
    fn try_send_queued(&self, ticket: u64, value: T) -> SendAttempt<T> {
        let mut queue = self.queue.lock();
        if queue.closed {
            Self::remove_sender(&mut queue, ticket);
            self.sync_events(&queue);
            return SendAttempt::Closed;
        }
        let at_head = queue.senders.front().is_some_and(|head| head.ticket == ticket);
        if !at_head || !self.has_room(&queue) {
            return SendAttempt::Full(value);
        }
        queue.senders.pop_front();
        queue.items.push_back(value);
        self.sync_events(&queue);
        SendAttempt::Sent
    }

    /// Drops a waiting sender from the queue, passing the turn on.
    fn withdraw(&self, ticket: u64) {
        let mut queue = self.queue.lock();
        if Self::remove_sender(&mut queue, ticket) {
            self.sync_events(&queue);
        }
    }

    fn remove_sender(queue: &mut Queue<T>, ticket: u64) -> bool {
        match queue.senders.iter().position(|waiter| waiter.ticket == ticket) {
            Some(index) => {
                queue.senders.remove(index);
                true
            }
            None => false,
        }
    }

    fn try_receive(&self) -> Option<Result<T>> {
        let mut queue = self.queue.lock();
        let outcome = match queue.items.pop_front() {
            Some(value) => Ok(value),
            None if queue.closed => Err(Error::channel_closed()),
            None => return None,
        };
        self.sync_events(&queue);
        Some(outcome)
    }
}

enum SendAttempt<T> {
    Sent,
    Queued {
        value: T,
        ticket: u64,
        turn: Arc<Event>,
    },
    Full(T),
    Closed,
}

/// Registers `event`'s descriptor, or a short deadline if it has none.
fn watch(ctx: &mut PrepareContext, event: &Event) {
    match event.raw_fd() {
        Ok(fd) => {
            ctx.add_poll_item(fd, Interest::READABLE);
        }
        Err(err) => {
            warn!(error = %err, "channel falling back to polling");
            ctx.add_deadline(Instant::now() + FALLBACK_POLL);
        }
    }
}

/// A FIFO queue whose operations are tasks.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> core::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let queue = self.shared.queue.lock();
        f.debug_struct("Channel")
            .field("len", &queue.items.len())
            .field("capacity", &self.shared.capacity)
            .field("closed", &queue.closed)
            .finish()
    }
}

impl<T: Send + 'static> Channel<T> {
    fn with_capacity(capacity: Option<usize>) -> Self {
        let shared = Shared {
            queue: Mutex::new(Queue {
                items: VecDeque::with_capacity(capacity.unwrap_or(0)),
                closed: false,
                senders: VecDeque::new(),
                next_ticket: 0,
            }),
            capacity,
            readable: Event::new(),
        };
        shared.sync_events(&shared.queue.lock());
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Creates a channel holding at most `capacity` values.
    ///
    /// A capacity of zero is rejected with
    /// [`ErrorKind::InvalidArgument`](crate::ErrorKind).
    pub fn bounded(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_argument("channel capacity must be at least 1"));
        }
        Ok(Self::with_capacity(Some(capacity)))
    }

    /// Creates a channel with no capacity limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Sends `value`.
    ///
    /// Resolves immediately if there is room and no earlier send is waiting.
    /// Otherwise the send queues behind the waiting ones, so values arrive in
    /// the order `send` was called. Fails with [`ErrorKind::ChannelClosed`](crate::ErrorKind)
    /// once the channel is closed.
    pub fn send(&self, value: T) -> Task<()> {
        match self.shared.try_send(value) {
            SendAttempt::Sent => Task::value(()),
            SendAttempt::Closed => Task::error(Error::channel_closed()),
            SendAttempt::Queued {
                value,
                ticket,
                turn,
            } => Task::from_op(SendOp {
                shared: Arc::clone(&self.shared),
                value: Some(value),
                ticket,
                turn,
                applied: CancelState::new(),
            }),
            SendAttempt::Full(_) => Task::error(Error::internal("fresh send was not queued")),
        }
    }

    /// Receives the oldest value.
    ///
    /// Resolves immediately if one is queued; otherwise waits for a sender.
    /// Once the channel is closed and drained, fails with
    /// [`ErrorKind::ChannelClosed`](crate::ErrorKind).
    pub fn receive(&self) -> Task<T> {
        match self.shared.try_receive() {
            Some(result) => Task::from_result(result),
            None => Task::from_op(ReceiveOp {
                shared: Arc::clone(&self.shared),
                applied: CancelState::new(),
            }),
        }
    }

    /// Closes the channel.
    ///
    /// Queued values can still be received. Waiting senders, and receivers
    /// once the queue is drained, fail with a closed error.
    pub fn close(&self) {
        let mut queue = self.shared.queue.lock();
        if !queue.closed {
            queue.closed = true;
            trace!(remaining = queue.items.len(), "channel closed");
        }
        self.shared.sync_events(&queue);
    }

    /// Returns true once the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }

    /// Returns the number of queued values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.queue.lock().items.len()
    }

    /// Returns true if no values are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the capacity of a bounded channel.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }
}

struct SendOp<T> {
    shared: Arc<Shared<T>>,
    value: Option<T>,
    ticket: u64,
    turn: Arc<Event>,
    applied: CancelState,
}

impl<T: Send + 'static> PendingOp<()> for SendOp<T> {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        if self.applied.applied().is_at_least(CancelLevel::Quit) {
            ctx.set_finished();
            return;
        }
        watch(ctx, &self.turn);
    }

    fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<()>> {
        let level = self.applied.applied();
        if level.is_at_least(CancelLevel::Quit) {
            self.value = None;
            self.shared.withdraw(self.ticket);
            return Poll::Ready(Task::error(Error::cancelled(level)));
        }
        let Some(value) = self.value.take() else {
            return Poll::Ready(Task::error(Error::internal("send already completed")));
        };
        match self.shared.try_send_queued(self.ticket, value) {
            SendAttempt::Sent => Poll::Ready(Task::value(())),
            SendAttempt::Closed => Poll::Ready(Task::error(Error::channel_closed())),
            SendAttempt::Full(value) | SendAttempt::Queued { value, .. } => {
                self.value = Some(value);
                Poll::Pending
            }
        }
    }

    fn cancel_and_wait(&mut self) -> Task<()> {
        self.value = None;
        self.shared.withdraw(self.ticket);
        Task::error(Error::cancelled(CancelLevel::Kill))
    }

    fn describe(&self, d: &mut Describe) {
        let queue = self.shared.queue.lock();
        let ahead = queue
            .senders
            .iter()
            .take_while(|waiter| waiter.ticket != self.ticket)
            .count();
        d.line(format_args!(
            "channel send (queue {}/{}, {ahead} senders ahead)",
            queue.items.len(),
            self.shared.capacity.unwrap_or(usize::MAX)
        ));
    }
}

impl<T> Drop for SendOp<T> {
    fn drop(&mut self) {
        self.shared.withdraw(self.ticket);
    }
}

struct ReceiveOp<T> {
    shared: Arc<Shared<T>>,
    applied: CancelState,
}

impl<T: Send + 'static> PendingOp<T> for ReceiveOp<T> {
    fn prepare_wait(&mut self, ctx: &mut PrepareContext, level: CancelLevel) {
        self.applied.escalate(level);
        if self.applied.applied().is_at_least(CancelLevel::Quit) {
            ctx.set_finished();
            return;
        }
        watch(ctx, &self.shared.readable);
    }

    fn finish_wait(&mut self, _ctx: &FinishContext<'_>) -> Poll<Task<T>> {
        let level = self.applied.applied();
        if level.is_at_least(CancelLevel::Quit) {
            return Poll::Ready(Task::error(Error::cancelled(level)));
        }
        match self.shared.try_receive() {
            Some(result) => Poll::Ready(Task::from_result(result)),
            None => Poll::Pending,
        }
    }

    fn cancel_and_wait(&mut self) -> Task<T> {
        Task::error(Error::cancelled(CancelLevel::Kill))
    }

    fn describe(&self, d: &mut Describe) {
        d.line("channel receive");
    }
}
