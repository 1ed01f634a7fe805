//! SIGINT handling for the headless console.
//!
//! Outside raw mode Ctrl-C arrives as a signal rather than a key. A listener
//! task counts presses; the console turns the first press into a soft
//! interrupt and any further press into a hard kill.

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::presenter::{KeyCommand, KeySource};

/// Shared count of SIGINT presses.
#[derive(Debug, Clone, Default)]
pub struct InterruptCounter {
    presses: Arc<AtomicUsize>,
}

impl InterruptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a SIGINT listener on the current tokio runtime.
    pub fn listen() -> Result<Self> {
        let counter = Self::new();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigint = signal(SignalKind::interrupt())?;
            let presses = counter.clone();
            tokio::spawn(async move {
                while sigint.recv().await.is_some() {
                    warn!("SIGINT received");
                    presses.record();
                }
            });
        }

        Ok(counter)
    }

    pub fn record(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
    }

    pub fn presses(&self) -> usize {
        self.presses.load(Ordering::SeqCst)
    }
}

/// Turns new presses into key commands.
#[derive(Debug, Clone, Default)]
pub struct InterruptKeys {
    counter: InterruptCounter,
    seen: usize,
}

impl InterruptKeys {
    pub fn new(counter: InterruptCounter) -> Self {
        Self { counter, seen: 0 }
    }
}

impl KeySource for InterruptKeys {
    fn poll_key(&mut self) -> Result<Option<KeyCommand>> {
        let presses = self.counter.presses();
        if presses <= self.seen {
            return Ok(None);
        }
        self.seen = presses;
        Ok(Some(if presses >= 2 { KeyCommand::Kill } else { KeyCommand::Interrupt }))
    }
}
