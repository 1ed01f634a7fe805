//! Event polling for the split-pane presenter.
//!
//! The engine is single-threaded and polls the terminal between multiplexer
//! waits, so every read here is bounded by a timeout (zero for a pure poll).

use crossterm::event::{self, Event as CrosstermEvent, KeyEventKind};
use std::time::Duration;

use super::input::KeyEvent;
use crate::error::Result;

/// Unified event type for the TUI.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Keyboard press
    Key(KeyEvent),
    /// Nothing happened before the timeout
    Tick,
    /// Terminal resize
    Resize(u16, u16),
}

/// Bounded reads of crossterm events.
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate_ms: u64) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
        }
    }

    /// Return an event if one is already queued.
    pub fn poll_now(&self) -> Result<Event> {
        Self::read_within(Duration::ZERO)
    }

    /// Wait at most one tick for an event.
    pub fn next(&self) -> Result<Event> {
        Self::read_within(self.tick_rate)
    }

    fn read_within(timeout: Duration) -> Result<Event> {
        if !event::poll(timeout)? {
            return Ok(Event::Tick);
        }
        let event = match event::read()? {
            // only presses; releases and repeats arrive on some terminals
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                Event::Key(KeyEvent::new(key.code, key.modifiers))
            }
            CrosstermEvent::Resize(w, h) => Event::Resize(w, h),
            _ => Event::Tick,
        };
        Ok(event)
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handler_tick_rate() {
        assert_eq!(EventHandler::new(50).tick_rate, Duration::from_millis(50));
        assert_eq!(EventHandler::default().tick_rate, Duration::from_millis(100));
    }
}
