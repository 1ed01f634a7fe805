//! State behind the split-pane view.
//!
//! - `PaneBuffer`: capped scrollback with a scroll offset
//! - `AppState`: both panes plus status-bar context and the active prompt

use ratatui::style::Color;
use std::collections::VecDeque;

use super::colors;
use super::input::TextInput;
use crate::domain::Cycle;

/// Lines kept per pane.
pub const SCROLLBACK_LIMIT: usize = 5000;

/// Remove ANSI escape sequences (CSI and OSC) and stray control characters.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    // parameters and intermediates, then one final byte
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\u{7}' {
                            break;
                        }
                        if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaneLine {
    pub text: String,
    pub color: Color,
}

/// Scrollback for one pane. `scroll` counts lines up from the bottom.
#[derive(Debug, Clone)]
pub struct PaneBuffer {
    lines: VecDeque<PaneLine>,
    limit: usize,
    scroll: usize,
}

impl Default for PaneBuffer {
    fn default() -> Self {
        Self::with_limit(SCROLLBACK_LIMIT)
    }
}

impl PaneBuffer {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            limit: limit.max(1),
            scroll: 0,
        }
    }

    pub fn push(&mut self, text: impl Into<String>, color: Color) {
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(PaneLine {
            text: text.into(),
            color,
        });
        // keep a scrolled-back view anchored on the same lines
        if self.scroll > 0 {
            self.scroll = (self.scroll + 1).min(self.lines.len().saturating_sub(1));
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_up(&mut self, by: usize) {
        self.scroll = (self.scroll + by).min(self.lines.len().saturating_sub(1));
    }

    pub fn scroll_down(&mut self, by: usize) {
        self.scroll = self.scroll.saturating_sub(by);
    }

    /// The `height` lines that are visible at the current scroll offset.
    pub fn visible(&self, height: usize) -> impl Iterator<Item = &PaneLine> {
        let end = self.lines.len().saturating_sub(self.scroll);
        let start = end.saturating_sub(height);
        self.lines.range(start..end)
    }
}

/// Operator prompt shown in the status bar.
#[derive(Debug, Clone, Default)]
pub struct PromptState {
    pub label: String,
    pub input: TextInput,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub flow: PaneBuffer,
    pub agent: PaneBuffer,
    pub show_agent: bool,
    pub cycle: Cycle,
    pub stage: Option<String>,
    pub paused: bool,
    /// Spinner label while a stage runs
    pub activity: Option<String>,
    pub spinner_frame: usize,
    pub prompt: Option<PromptState>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            show_agent: true,
            ..Default::default()
        }
    }

    pub fn push_flow(&mut self, text: &str, color: Color) {
        for line in strip_ansi(text).lines() {
            self.flow.push(line, color);
        }
        if text.is_empty() {
            self.flow.push("", color);
        }
    }

    pub fn push_agent(&mut self, stage: &str, text: &str, color: Color) {
        self.agent.push(format!("{:<10} │ {}", stage, strip_ansi(text)), color);
    }

    /// Status line text without styling.
    pub fn status_text(&self) -> String {
        let stage = self.stage.as_deref().unwrap_or("-");
        let state = if self.paused { " [PAUSED]" } else { "" };
        format!("cycle {} │ {}{}", self.cycle, stage, state)
    }

    pub fn status_color(&self) -> Color {
        if self.paused { colors::PAUSED } else { colors::TEXT }
    }
}
