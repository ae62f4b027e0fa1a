//! Interest and readiness flags for descriptor waits.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Conditions an operation wants to be woken for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u8);

impl Interest {
    /// No interest.
    pub const NONE: Self = Self(0);
    /// Interest in readable events.
    pub const READABLE: Self = Self(1 << 0);
    /// Interest in writable events.
    pub const WRITABLE: Self = Self(1 << 1);
    /// Interest in priority (out-of-band) data.
    pub const PRIORITY: Self = Self(1 << 2);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if `other` is fully contained in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no interest is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if readable interest is set.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    /// Returns true if writable interest is set.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }
}

impl BitOr for Interest {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.is_readable() {
            parts.push("READABLE");
        }
        if self.is_writable() {
            parts.push("WRITABLE");
        }
        if self.contains(Self::PRIORITY) {
            parts.push("PRIORITY");
        }
        if parts.is_empty() {
            write!(f, "Interest(NONE)")
        } else {
            write!(f, "Interest({})", parts.join(" | "))
        }
    }
}

/// Conditions the OS reported for a descriptor after a wait.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Readiness(u8);

impl Readiness {
    /// Nothing fired.
    pub const EMPTY: Self = Self(0);
    /// The descriptor is readable.
    pub const READABLE: Self = Self(1 << 0);
    /// The descriptor is writable.
    pub const WRITABLE: Self = Self(1 << 1);
    /// Priority data is available.
    pub const PRIORITY: Self = Self(1 << 2);
    /// An error condition is pending on the descriptor.
    pub const ERROR: Self = Self(1 << 3);
    /// The peer hung up.
    pub const HANGUP: Self = Self(1 << 4);
    /// The descriptor is not open.
    pub const INVALID: Self = Self(1 << 5);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if `other` is fully contained in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if nothing fired.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if an error, hangup, or invalid-descriptor condition fired.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.0 & (Self::ERROR.0 | Self::HANGUP.0 | Self::INVALID.0) != 0
    }
}

impl BitOr for Readiness {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Readiness, &str); 6] = [
            (Readiness::READABLE, "READABLE"),
            (Readiness::WRITABLE, "WRITABLE"),
            (Readiness::PRIORITY, "PRIORITY"),
            (Readiness::ERROR, "ERROR"),
            (Readiness::HANGUP, "HANGUP"),
            (Readiness::INVALID, "INVALID"),
        ];
        let parts: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if parts.is_empty() {
            write!(f, "Readiness(EMPTY)")
        } else {
            write!(f, "Readiness({})", parts.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_combines() {
        let both = Interest::READABLE | Interest::WRITABLE;
        assert!(both.is_readable());
        assert!(both.is_writable());
        assert!(!both.contains(Interest::PRIORITY));
        assert_eq!(format!("{both:?}"), "Interest(READABLE | WRITABLE)");
    }

    #[test]
    fn readiness_failure_bits() {
        assert!(!Readiness::READABLE.is_failure());
        assert!((Readiness::READABLE | Readiness::HANGUP).is_failure());
        assert!(Readiness::INVALID.is_failure());
        assert_eq!(format!("{:?}", Readiness::EMPTY), "Readiness(EMPTY)");
    }
}
