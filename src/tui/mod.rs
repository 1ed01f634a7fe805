//! Split-pane terminal interface for cycler.
//!
//! Three regions:
//! - **Flow**: top pane with orchestration messages
//! - **Agent**: bottom pane with raw agent output (toggle with `v`)
//! - **Status bar**: hotkeys, cycle, stage and pause state
//!
//! The terminal is owned by [`TerminalGuard`]; dropping it (or panicking)
//! leaves raw mode and the alternate screen.

mod events;
mod input;
mod split_pane;
mod state;
mod views;

pub use events::{Event, EventHandler};
pub use input::{KeyEvent, PaneKey, TextInput, running_key};
pub use split_pane::SplitPanePresenter;
pub use state::{AppState, PaneBuffer, PaneLine, SCROLLBACK_LIMIT, strip_ansi};

use crossterm::{
    ExecutableCommand,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::io::{Stdout, stdout};
use std::sync::Once;

use crate::error::{CyclerError, Result};

/// Type alias for our terminal backend.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

static PANIC_HOOK: Once = Once::new();

/// Enter raw mode and the alternate screen.
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode().map_err(|e| CyclerError::Terminal(format!("raw mode: {}", e)))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| CyclerError::Terminal(format!("alternate screen: {}", e)))?;
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend).map_err(|e| CyclerError::Terminal(e.to_string()))
}

/// Leave raw mode and the alternate screen. Safe to call more than once.
pub fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Restore the terminal before the default panic message is printed.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = restore_terminal();
            previous(info);
        }));
    });
}

/// Owns raw mode plus the alternate screen for the lifetime of the TUI.
pub struct TerminalGuard {
    terminal: Tui,
    active: bool,
}

impl TerminalGuard {
    pub fn acquire() -> Result<Self> {
        install_panic_hook();
        let terminal = init_terminal()?;
        Ok(Self { terminal, active: true })
    }

    pub fn terminal(&mut self) -> &mut Tui {
        &mut self.terminal
    }

    /// Hand the terminal back to the shell, e.g. for an editor.
    pub fn suspend(&mut self) -> Result<()> {
        if self.active {
            restore_terminal()?;
            self.active = false;
        }
        Ok(())
    }

    /// Take the terminal back after `suspend`, forcing a full redraw.
    pub fn resume(&mut self) -> Result<()> {
        if !self.active {
            enable_raw_mode()?;
            stdout().execute(EnterAlternateScreen)?;
            self.active = true;
        }
        self.terminal.clear()?;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = restore_terminal();
            let _ = self.terminal.show_cursor();
        }
    }
}

/// Pane and status colors.
pub mod colors {
    use ratatui::style::Color;

    pub const HEADER: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const SUCCESS: Color = Color::Rgb(50, 205, 50); // Lime green
    pub const WARNING: Color = Color::Rgb(255, 215, 0); // Gold
    pub const ERROR: Color = Color::Rgb(220, 20, 60); // Crimson
    pub const PAUSED: Color = Color::Rgb(255, 255, 0); // Yellow
    pub const KEYBIND: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const DIM: Color = Color::DarkGray;
    pub const TEXT: Color = Color::White;

    /// Map a configured stage color name; unknown names fall back to `TEXT`.
    pub fn named(name: &str) -> Color {
        match name.to_ascii_lowercase().as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" | "purple" => Color::Magenta,
            "cyan" => Color::Cyan,
            "white" => Color::White,
            "gray" | "grey" => Color::Gray,
            _ => TEXT,
        }
    }
}
