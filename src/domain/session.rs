//! Session state shared across cycles.

use super::cycle::Cycle;
use super::outcome::SessionOutcome;

/// Mutable state of one orchestration session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub cycle: Cycle,
    pub quit_requested: bool,
    pub user_aborted: bool,
    pub killed: bool,
    pub failed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next cycle after a successful promotion.
    pub fn advance(&mut self) {
        self.cycle = self.cycle.next();
    }

    /// Record why the session ended.
    pub fn stop_with(&mut self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Completed | SessionOutcome::LimitReached { .. } => self.quit_requested = true,
            SessionOutcome::Aborted => self.user_aborted = true,
            SessionOutcome::Killed => self.killed = true,
            _ => self.failed = true,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.quit_requested || self.user_aborted || self.killed || self.failed
    }
}
