//! Split-pane presenter.
//!
//! Raw-mode keys are polled between multiplexer waits; pane actions (toggle,
//! scroll) are handled here and only engine commands are passed on.

use log::{debug, warn};
use ratatui::style::Color;
use std::path::Path;

use super::events::{Event, EventHandler};
use super::input::{KeyEvent, PaneKey, TextInput, running_key};
use super::state::{AppState, PromptState};
use super::{TerminalGuard, colors, views};
use crate::domain::{Assessment, Cycle, ReqapDocument};
use crate::error::Result;
use crate::presenter::{AgentLine, KeyCommand, KeySource, LineKind, Presenter, Tone, run_editor};
use crossterm::event::KeyCode;

const SCROLL_STEP: usize = 10;

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Info => colors::TEXT,
        Tone::Success => colors::SUCCESS,
        Tone::Warning => colors::WARNING,
        Tone::Error => colors::ERROR,
        Tone::Header => colors::HEADER,
    }
}

fn assessment_color(assessment: Assessment) -> Color {
    match assessment {
        Assessment::Success => colors::SUCCESS,
        Assessment::Partial => colors::WARNING,
        Assessment::Failure => colors::ERROR,
        Assessment::Unknown => colors::DIM,
    }
}

pub struct SplitPanePresenter {
    guard: TerminalGuard,
    state: AppState,
    events: EventHandler,
}

impl SplitPanePresenter {
    /// Take over the terminal. It is restored when the presenter is dropped.
    pub fn new(tick_rate_ms: u64) -> Result<Self> {
        let mut presenter = Self {
            guard: TerminalGuard::acquire()?,
            state: AppState::new(),
            events: EventHandler::new(tick_rate_ms),
        };
        presenter.redraw();
        Ok(presenter)
    }

    fn redraw(&mut self) {
        let state = &self.state;
        if let Err(e) = self.guard.terminal().draw(|frame| views::render(frame, state)) {
            warn!("TUI draw failed: {}", e);
        }
    }

    /// Apply a running-mode key; returns the engine command, if any.
    fn handle_key(&mut self, key: &KeyEvent) -> Option<KeyCommand> {
        match running_key(key)? {
            PaneKey::Command(cmd) => Some(cmd),
            PaneKey::ToggleAgentPane => {
                self.state.show_agent = !self.state.show_agent;
                self.redraw();
                None
            }
            PaneKey::ScrollUp => {
                self.state.agent.scroll_up(SCROLL_STEP);
                self.redraw();
                None
            }
            PaneKey::ScrollDown => {
                self.state.agent.scroll_down(SCROLL_STEP);
                self.redraw();
                None
            }
        }
    }
}

impl KeySource for SplitPanePresenter {
    fn poll_key(&mut self) -> Result<Option<KeyCommand>> {
        loop {
            match self.events.poll_now()? {
                Event::Tick => return Ok(None),
                Event::Resize(..) => self.redraw(),
                Event::Key(key) => {
                    if let Some(cmd) = self.handle_key(&key) {
                        return Ok(Some(cmd));
                    }
                }
            }
        }
    }
}

impl Presenter for SplitPanePresenter {
    fn log_main(&mut self, tone: Tone, text: &str) {
        self.state.push_flow(text, tone_color(tone));
        self.redraw();
    }

    fn log_agent(&mut self, line: &AgentLine) {
        let color = match line.kind {
            LineKind::Stderr => colors::ERROR,
            _ => line.color.as_deref().map(colors::named).unwrap_or(colors::TEXT),
        };
        self.state.push_agent(&line.stage, &line.text, color);
        // lifecycle lines also belong to the flow
        if line.kind == LineKind::Lifecycle {
            self.state.push_flow(&format!("[{}] {}", line.stage, line.text.trim()), color);
        }
        self.redraw();
    }

    fn show_review(&mut self, cycle: Cycle, doc: &ReqapDocument) {
        self.state
            .push_flow(&format!("──── checkpoint {:03} ────", cycle.get()), colors::WARNING);
        if doc.is_readable() {
            self.state.push_flow(doc.body(), colors::TEXT);
        } else {
            self.state
                .push_flow(&format!("[could not read {}]", doc.path.display()), colors::ERROR);
        }
        self.state
            .push_flow(&format!("Result: {}", doc.assessment), assessment_color(doc.assessment));
        self.redraw();
    }

    fn prompt_blocking(&mut self, prompt: &str) -> Result<String> {
        self.state.prompt = Some(PromptState {
            label: prompt.to_string(),
            input: TextInput::new(),
        });
        self.redraw();

        let answer = loop {
            match self.events.next()? {
                Event::Tick => continue,
                Event::Resize(..) => self.redraw(),
                Event::Key(key) => {
                    if key.is_ctrl_c() {
                        break "\u{3}".to_string();
                    }
                    match key.code {
                        KeyCode::Enter => {
                            break self.state.prompt.as_mut().map(|p| p.input.take()).unwrap_or_default();
                        }
                        KeyCode::PageUp => self.state.flow.scroll_up(SCROLL_STEP),
                        KeyCode::PageDown => self.state.flow.scroll_down(SCROLL_STEP),
                        _ => {
                            if let Some(prompt) = self.state.prompt.as_mut() {
                                prompt.input.handle_key(&key);
                            }
                        }
                    }
                    self.redraw();
                }
            }
        };

        debug!("prompt answer: {:?}", answer);
        self.state.prompt = None;
        self.state.flow.scroll_down(usize::MAX);
        self.redraw();
        Ok(answer)
    }

    fn suspend_for_editor(&mut self, editor: &str, path: &Path) -> Result<()> {
        self.guard.suspend()?;
        let result = run_editor(editor, path);
        self.guard.resume()?;
        self.redraw();
        result
    }

    fn activity_started(&mut self, label: &str) {
        self.state.activity = Some(label.to_string());
        self.state.spinner_frame = 0;
        self.redraw();
    }

    fn activity_tick(&mut self) {
        if self.state.activity.is_some() {
            self.state.spinner_frame += 1;
            self.redraw();
        }
    }

    fn activity_finished(&mut self) {
        self.state.activity = None;
        self.redraw();
    }

    fn set_status(&mut self, cycle: Cycle, stage: Option<&str>, paused: bool) {
        self.state.cycle = cycle;
        self.state.stage = stage.map(str::to_string);
        self.state.paused = paused;
        self.redraw();
    }
}
