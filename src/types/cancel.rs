//! Cancel levels and escalation tracking.
//!
//! Cancellation in stagehand is a request, not a preemption. A request carries
//! one of four ordered [`CancelLevel`]s, and each pending operation decides how
//! it reacts at each level. Requests only ever escalate: asking for a weaker
//! level after a stronger one has no effect.

use core::fmt;
use core::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};

/// The severity of a cancellation request.
///
/// Levels are totally ordered from "no request" to "stop unconditionally".
/// Combinators compare levels against thresholds: `level >= CancelLevel::Abort`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CancelLevel {
    /// No cancellation has been requested.
    #[default]
    None = 0,
    /// Best-effort graceful stop; in-progress work may be completed first.
    Quit = 1,
    /// Stop even if that loses buffered or in-flight data.
    Abort = 2,
    /// Stop unconditionally; resources may be leaked or forced closed.
    Kill = 3,
}

impl CancelLevel {
    /// All levels, weakest first.
    pub const ALL: [Self; 4] = [Self::None, Self::Quit, Self::Abort, Self::Kill];

    /// Returns the level name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Quit => "quit",
            Self::Abort => "abort",
            Self::Kill => "kill",
        }
    }

    /// Returns the numeric severity of this level.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a numeric severity back into a level.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Quit),
            2 => Some(Self::Abort),
            3 => Some(Self::Kill),
            _ => None,
        }
    }

    /// Returns true if any cancellation has been requested.
    #[must_use]
    pub const fn is_requested(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns true if this level is at least as severe as `other`.
    #[must_use]
    pub const fn is_at_least(self, other: Self) -> bool {
        self as u8 >= other as u8
    }
}

impl fmt::Display for CancelLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The strongest cancel level an operation has applied so far.
///
/// Operations receive the current level on every preparation pass. They keep
/// a `CancelState` so that they react to each escalation exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelState {
    applied: CancelLevel,
}

impl CancelState {
    /// Creates a state with nothing applied.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            applied: CancelLevel::None,
        }
    }

    /// Returns the strongest level applied so far.
    #[must_use]
    pub const fn applied(&self) -> CancelLevel {
        self.applied
    }

    /// Applies `level` if it is strictly stronger than the applied level.
    ///
    /// Returns `true` if the applied level changed.
    pub fn escalate(&mut self, level: CancelLevel) -> bool {
        if level > self.applied {
            self.applied = level;
            return true;
        }
        false
    }
}

/// A cancel level shared across threads.
///
/// Used by prepared-task handles, where the reactor thread reads the level
/// while foreign threads raise it.
#[derive(Debug, Default)]
pub struct AtomicCancelLevel(AtomicU8);

impl AtomicCancelLevel {
    /// Creates a new shared level.
    #[must_use]
    pub const fn new(level: CancelLevel) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    /// Returns the current level.
    #[must_use]
    pub fn load(&self) -> CancelLevel {
        CancelLevel::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(CancelLevel::Kill)
    }

    /// Raises the level to `level` if it is stronger.
    ///
    /// Returns `true` if this call changed the stored level.
    pub fn raise(&self, level: CancelLevel) -> bool {
        let previous = self.0.fetch_max(level as u8, Ordering::AcqRel);
        previous < level as u8
    }
}

/// Maps any level inside a half-open interval to a fixed target level.
///
/// A remap of `Quit..Abort` onto `None` makes a nested task ignore graceful
/// stop requests while still honoring `Abort` and `Kill`. A remap of
/// `Quit..Kill` onto `Kill` upgrades every request to an unconditional stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelRemap {
    start: CancelLevel,
    end: CancelLevel,
    target: CancelLevel,
}

impl CancelRemap {
    /// Creates a remap of `range` onto `target`.
    #[must_use]
    pub const fn new(range: Range<CancelLevel>, target: CancelLevel) -> Self {
        Self {
            start: range.start,
            end: range.end,
            target,
        }
    }

    /// Returns the remapped level.
    #[must_use]
    pub fn apply(&self, level: CancelLevel) -> CancelLevel {
        if level >= self.start && level < self.end {
            self.target
        } else {
            level
        }
    }

    /// Returns the interval this remap covers.
    #[must_use]
    pub const fn range(&self) -> Range<CancelLevel> {
        self.start..self.end
    }

    /// Returns the level requests inside the interval are mapped to.
    #[must_use]
    pub const fn target(&self) -> CancelLevel {
        self.target
    }
}

impl fmt::Display for CancelRemap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) -> {}", self.start, self.end, self.target)
    }
}
