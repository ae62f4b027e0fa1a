//! Indented, human-readable dumps of a task's wait state.

use core::fmt::{self, Write};

/// Builder for nested wait-state descriptions.
///
/// Each pending operation writes one line about itself and nests its
/// children beneath it.
#[derive(Debug, Default)]
pub struct Describe {
    out: String,
    depth: usize,
}

impl Describe {
    /// Creates an empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one line at the current depth.
    pub fn line(&mut self, text: impl fmt::Display) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        let _ = writeln!(self.out, "{text}");
    }

    /// Runs `f` one level deeper.
    pub fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    /// Returns the rendered text.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}
