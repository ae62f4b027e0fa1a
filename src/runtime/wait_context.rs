//! The preparation / finalization protocol shared by every pending operation.
//!
//! Each reactor iteration builds one [`PrepareContext`] from scratch. Every
//! in-flight operation appends its wait interest to it: descriptors to watch,
//! absolute deadlines, or a mark saying it can complete without waiting.
//! Bracketing each operation's registration with a [`Checkpoint`] produces a
//! [`Memento`]: the half-open index ranges that operation owns.
//!
//! After the OS wait, the runner builds a [`FinishContext`] naming what fired
//! and hands it to the operation whose memento contains it. Composite
//! operations keep a memento per child and use [`FinishContext::contains`] to
//! forward only to the children that are affected.
//!
//! Mementos are ordered: operations registered later own strictly later
//! ranges, which is what lets the runner find an owner with a binary search.

use crate::runtime::reactor::{Interest, PollItem, Readiness};
use std::ops::Range;
use std::os::unix::io::RawFd;
use std::time::Instant;

/// Wait interest accumulated during one preparation pass.
#[derive(Debug, Default)]
pub struct PrepareContext {
    items: Vec<PollItem>,
    deadlines: Vec<Instant>,
    finished: usize,
}

impl PrepareContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty context with room for `capacity` descriptors.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            deadlines: Vec::new(),
            finished: 0,
        }
    }

    /// Resets the context for a new pass, keeping allocations.
    pub fn clear(&mut self) {
        self.items.clear();
        self.deadlines.clear();
        self.finished = 0;
    }

    /// Registers a descriptor and returns its index in the merged list.
    pub fn add_poll_item(&mut self, fd: RawFd, interest: Interest) -> usize {
        self.items.push(PollItem::new(fd, interest));
        self.items.len() - 1
    }

    /// Registers an absolute deadline.
    pub fn add_deadline(&mut self, deadline: Instant) {
        self.deadlines.push(deadline);
    }

    /// Marks the calling operation as able to complete without waiting.
    ///
    /// Any mark in a pass makes the runner skip the OS wait for that pass.
    pub fn set_finished(&mut self) {
        self.finished += 1;
    }

    /// Snapshots the current list lengths.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            poll: self.items.len(),
            timers: self.deadlines.len(),
            finished: self.finished,
        }
    }

    /// Returns everything registered since `checkpoint`.
    #[must_use]
    pub fn memento_since(&self, checkpoint: Checkpoint) -> Memento {
        Memento {
            poll: checkpoint.poll..self.items.len(),
            timers: checkpoint.timers..self.deadlines.len(),
            finished: self.finished - checkpoint.finished,
        }
    }

    /// Returns the earliest registered deadline.
    #[must_use]
    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().min().copied()
    }

    /// Returns the merged descriptor list.
    #[must_use]
    pub fn poll_items(&self) -> &[PollItem] {
        &self.items
    }

    pub(crate) fn poll_items_mut(&mut self) -> &mut [PollItem] {
        &mut self.items
    }

    /// Returns the registered deadlines in registration order.
    #[must_use]
    pub fn deadlines(&self) -> &[Instant] {
        &self.deadlines
    }

    /// Returns how many operations marked themselves finished this pass.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.finished
    }
}

/// Snapshot of a [`PrepareContext`]'s list lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    poll: usize,
    timers: usize,
    finished: usize,
}

/// The index ranges one operation registered during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memento {
    poll: Range<usize>,
    timers: Range<usize>,
    finished: usize,
}

impl Memento {
    /// Descriptor indices owned by the operation.
    #[must_use]
    pub fn poll_range(&self) -> Range<usize> {
        self.poll.clone()
    }

    /// Deadline indices owned by the operation.
    #[must_use]
    pub fn timer_range(&self) -> Range<usize> {
        self.timers.clone()
    }

    /// Number of "already finished" marks the operation set.
    #[must_use]
    pub const fn finished(&self) -> usize {
        self.finished
    }

    /// Returns true if the operation marked itself finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished > 0
    }

    /// Returns true if the operation registered nothing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.poll.is_empty() && self.timers.is_empty() && self.finished == 0
    }
}

/// What a finalization pass is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The OS wait was skipped; operations that marked themselves finished
    /// should complete.
    Finished,
    /// The descriptor at this index fired.
    PollItem(usize),
    /// The deadline at this index expired.
    Timer(usize),
}

/// Read-only view handed to `finish_wait`.
#[derive(Debug, Clone, Copy)]
pub struct FinishContext<'a> {
    prep: &'a PrepareContext,
    selection: Selection,
}

impl<'a> FinishContext<'a> {
    /// Creates a context reporting `selection` against `prep`.
    #[must_use]
    pub const fn new(prep: &'a PrepareContext, selection: Selection) -> Self {
        Self { prep, selection }
    }

    /// Returns what fired.
    #[must_use]
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    /// Returns true if what fired belongs to `memento`.
    #[must_use]
    pub fn contains(&self, memento: &Memento) -> bool {
        match self.selection {
            Selection::Finished => memento.is_finished(),
            Selection::PollItem(index) => memento.poll.contains(&index),
            Selection::Timer(index) => memento.timers.contains(&index),
        }
    }

    /// Returns the readiness of the fired descriptor, if a descriptor fired.
    #[must_use]
    pub fn readiness(&self) -> Option<Readiness> {
        match self.selection {
            Selection::PollItem(index) => self.prep.items.get(index).map(|item| item.readiness),
            _ => None,
        }
    }

    /// Returns the readiness reported for any descriptor in `memento`.
    ///
    /// Flags of every owned descriptor are merged.
    #[must_use]
    pub fn readiness_in(&self, memento: &Memento) -> Readiness {
        self.prep
            .items
            .get(memento.poll.clone())
            .map_or(Readiness::EMPTY, |items| {
                items
                    .iter()
                    .fold(Readiness::EMPTY, |acc, item| acc | item.readiness)
            })
    }

    /// Returns true if a deadline expired.
    #[must_use]
    pub const fn is_timer(&self) -> bool {
        matches!(self.selection, Selection::Timer(_))
    }

    /// Returns true if this is an "already finished" pass.
    #[must_use]
    pub const fn is_finished_pass(&self) -> bool {
        matches!(self.selection, Selection::Finished)
    }

    /// Returns the preparation context this pass was built from.
    #[must_use]
    pub const fn prepared(&self) -> &'a PrepareContext {
        self.prep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn mementos_partition_the_lists() {
        let mut prep = PrepareContext::new();
        prep.add_poll_item(0, Interest::READABLE);

        let cp = prep.checkpoint();
        prep.add_poll_item(10, Interest::READABLE);
        prep.add_poll_item(11, Interest::WRITABLE);
        let first = prep.memento_since(cp);

        let cp = prep.checkpoint();
        prep.add_deadline(Instant::now() + Duration::from_secs(1));
        let second = prep.memento_since(cp);

        let cp = prep.checkpoint();
        prep.set_finished();
        let third = prep.memento_since(cp);

        assert_eq!(first.poll_range(), 1..3);
        assert!(first.timer_range().is_empty());
        assert_eq!(second.timer_range(), 0..1);
        assert!(second.poll_range().is_empty());
        assert!(third.is_finished());
        assert!(!second.is_finished());
        assert_eq!(prep.finished_count(), 1);
    }

    #[test]
    fn finish_context_attributes_selection() {
        let mut prep = PrepareContext::new();
        let cp = prep.checkpoint();
        prep.add_poll_item(3, Interest::READABLE);
        let owner = prep.memento_since(cp);
        let cp = prep.checkpoint();
        let idle = prep.memento_since(cp);
        prep.poll_items_mut()[0].readiness = Readiness::READABLE;

        let ctx = FinishContext::new(&prep, Selection::PollItem(0));
        assert!(ctx.contains(&owner));
        assert!(!ctx.contains(&idle));
        assert!(idle.is_idle());
        assert_eq!(ctx.readiness(), Some(Readiness::READABLE));
        assert_eq!(ctx.readiness_in(&owner), Readiness::READABLE);

        let ctx = FinishContext::new(&prep, Selection::Finished);
        assert!(!ctx.contains(&owner));
        assert!(ctx.is_finished_pass());
    }

    #[test]
    fn clear_resets_everything() {
        let mut prep = PrepareContext::with_capacity(4);
        prep.add_poll_item(1, Interest::READABLE);
        prep.add_deadline(Instant::now());
        prep.set_finished();
        prep.clear();
        assert!(prep.poll_items().is_empty());
        assert!(prep.deadlines().is_empty());
        assert_eq!(prep.finished_count(), 0);
        assert_eq!(prep.earliest_deadline(), None);
    }
}
