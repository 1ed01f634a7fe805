//! Headless console presenter.
//!
//! Single stream of prefixed, colored lines with a spinner while a stage runs.
//! Only lifecycle lines from agents are shown; everything else goes to the
//! per-stage log files.

use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::debug;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use super::{AgentLine, KeyCommand, KeySource, LineKind, Presenter, Tone, run_editor};
use crate::domain::{Assessment, Cycle, ReqapDocument};
use crate::error::Result;
use crate::signals::{InterruptCounter, InterruptKeys};

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_RATE: Duration = Duration::from_millis(100);
const BANNER_WIDTH: usize = 78;
const NAME_WIDTH: usize = 10;

/// Raw mode held for the duration of a single key read.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

struct Spinner {
    label: String,
    frame: usize,
    last_draw: Instant,
}

pub struct ConsolePresenter {
    tag: String,
    keys: InterruptKeys,
    spinner: Option<Spinner>,
}

impl ConsolePresenter {
    /// `tag` labels every line, e.g. "auto" or "live".
    pub fn new(tag: impl Into<String>, interrupts: InterruptCounter) -> Self {
        Self {
            tag: tag.into(),
            keys: InterruptKeys::new(interrupts),
            spinner: None,
        }
    }

    fn prefix(&self, who: &str) -> String {
        format!("[{}] {:<width$} »", self.tag, who, width = NAME_WIDTH)
    }

    fn clear_line(&self) {
        if self.spinner.is_some() {
            let mut out = io::stdout().lock();
            let _ = write!(out, "\r\x1b[2K");
            let _ = out.flush();
        }
    }

    fn draw_spinner(&mut self) {
        let prefix = self.prefix("cycler");
        if let Some(spinner) = self.spinner.as_mut() {
            let frame = FRAMES[spinner.frame % FRAMES.len()];
            let mut out = io::stdout().lock();
            let _ = write!(out, "\r\x1b[2K{} {} {}", prefix.blue(), frame.blue().bold(), spinner.label.cyan());
            let _ = out.flush();
            spinner.last_draw = Instant::now();
        }
    }

    /// Print a full line without leaving spinner debris behind.
    fn emit(&mut self, line: String) {
        self.clear_line();
        {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
        self.draw_spinner();
    }

    fn read_key(&mut self) -> Result<String> {
        let _guard = RawModeGuard::acquire()?;
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok("\u{3}".to_string());
                    }
                    KeyCode::Char(c) => return Ok(c.to_string()),
                    KeyCode::Enter => return Ok(String::new()),
                    _ => {}
                }
            }
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        // a Ctrl-C while blocked in read_line only shows up in the counter
        if self.keys.poll_key()?.is_some() {
            return Ok("\u{3}".to_string());
        }
        Ok(line.trim().to_string())
    }
}

fn assessment_colored(assessment: Assessment) -> ColoredString {
    let text = assessment.to_string();
    match assessment {
        Assessment::Success => text.green().bold(),
        Assessment::Partial => text.yellow().bold(),
        Assessment::Failure => text.red().bold(),
        Assessment::Unknown => text.white().bold(),
    }
}

impl KeySource for ConsolePresenter {
    fn poll_key(&mut self) -> Result<Option<KeyCommand>> {
        self.keys.poll_key()
    }
}

impl Presenter for ConsolePresenter {
    fn log_main(&mut self, tone: Tone, text: &str) {
        let prefix = self.prefix("cycler").blue();
        let body = match tone {
            Tone::Info => text.normal(),
            Tone::Success => text.green(),
            Tone::Warning => text.yellow(),
            Tone::Error => text.red(),
            Tone::Header => text.cyan().bold(),
        };
        self.emit(format!("{} {}", prefix, body));
    }

    fn log_agent(&mut self, line: &AgentLine) {
        if line.kind != LineKind::Lifecycle {
            return;
        }
        let color = line.color.as_deref().unwrap_or("blue");
        let name = format!("{:<width$}", line.stage, width = NAME_WIDTH).color(color);
        let prefix = format!("[{}] {} »", self.tag, name);
        self.emit(format!("{} {}", prefix, line.text.trim()));
    }

    fn show_review(&mut self, cycle: Cycle, doc: &ReqapDocument) {
        let title = format!(" checkpoint {:03} ", cycle.get());
        let pad = BANNER_WIDTH.saturating_sub(title.len()) / 2;
        let banner = format!("{}{}{}", "=".repeat(pad).yellow().bold(), title.white().bold(), "=".repeat(pad).yellow().bold());

        let body = if doc.is_readable() {
            doc.body().to_string()
        } else {
            format!("[could not read {}]", doc.path.display()).red().to_string()
        };

        self.emit(String::new());
        self.emit(banner);
        for line in body.lines() {
            self.emit(line.to_string());
        }
        self.emit("=".repeat(BANNER_WIDTH).yellow().bold().to_string());
        let prefix = self.prefix("gatekeeper").yellow();
        self.emit(format!("{} Result: {}", prefix, assessment_colored(doc.assessment)));
    }

    fn prompt_blocking(&mut self, prompt: &str) -> Result<String> {
        self.clear_line();
        {
            let mut out = io::stdout().lock();
            write!(out, "{} {} ", self.prefix("gatekeeper").yellow(), prompt.white().bold())?;
            out.flush()?;
        }
        let answer = if io::stdin().is_terminal() { self.read_key()? } else { self.read_line()? };
        debug!("prompt answer: {:?}", answer);
        println!();
        Ok(answer)
    }

    fn suspend_for_editor(&mut self, editor: &str, path: &Path) -> Result<()> {
        self.clear_line();
        run_editor(editor, path)
    }

    fn activity_started(&mut self, label: &str) {
        self.spinner = Some(Spinner {
            label: label.to_string(),
            frame: 0,
            last_draw: Instant::now(),
        });
        self.draw_spinner();
    }

    fn activity_tick(&mut self) {
        let due = match self.spinner.as_mut() {
            Some(spinner) if spinner.last_draw.elapsed() >= SPINNER_RATE => {
                spinner.frame += 1;
                true
            }
            _ => false,
        };
        if due {
            self.draw_spinner();
        }
    }

    fn activity_finished(&mut self) {
        self.clear_line();
        self.spinner = None;
    }

    fn set_status(&mut self, _cycle: Cycle, _stage: Option<&str>, paused: bool) {
        if let Some(spinner) = self.spinner.as_mut() {
            if paused && !spinner.label.ends_with("(paused)") {
                spinner.label.push_str(" (paused)");
            } else if !paused {
                spinner.label = spinner.label.trim_end_matches(" (paused)").to_string();
            }
        }
        self.draw_spinner();
    }
}
