//! Cycle counter
//!
//! A cycle is one pass of plan, build, review and checkpoint. Cycles start at 1
//! and only ever move forward.

use std::fmt;

/// Identifies one pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cycle(u32);

impl Cycle {
    /// The first cycle of every session.
    pub const FIRST: Cycle = Cycle(1);

    /// Create a cycle from a raw number, clamping zero up to 1.
    pub fn new(n: u32) -> Self {
        Self(n.max(1))
    }

    /// Raw cycle number
    pub fn get(self) -> u32 {
        self.0
    }

    /// The cycle that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
