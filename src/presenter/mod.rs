//! Presentation sinks.
//!
//! The orchestration engine talks to the operator exclusively through the
//! [`Presenter`] trait. One implementation is chosen at startup:
//! - [`ConsolePresenter`]: single-stream console with spinner and colored prefixes
//! - `tui::SplitPanePresenter`: flow pane, agent pane and status bar
//! - [`ScriptedPresenter`]: no terminal at all, driven by queued answers
//!
//! Presenters are sinks: they render state, they never own it.

mod console;
mod scripted;

pub use console::ConsolePresenter;
pub use scripted::ScriptedPresenter;

use log::{info, warn};
use std::path::Path;
use std::process::Command;

use crate::domain::{Cycle, ReqapDocument};
use crate::error::{CyclerError, Result};

/// Advisory styling for flow messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
    Header,
}

/// How an agent output line was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Stdout line announcing a lifecycle event; surfaced everywhere
    Lifecycle,
    /// Any other stdout line; logged, shown only in the agent pane
    Detail,
    Stderr,
}

/// One line of agent output on its way to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLine {
    pub stage: String,
    pub text: String,
    pub kind: LineKind,
    pub color: Option<String>,
}

/// Keyboard commands that matter while a stage is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Pause or resume the running stage
    Pause,
    /// Soft interrupt: terminate the stage and stop the session
    Interrupt,
    /// Hard kill: SIGKILL the stage and leave immediately
    Kill,
}

/// Non-blocking key polling.
pub trait KeySource {
    fn poll_key(&mut self) -> Result<Option<KeyCommand>>;
}

/// Everything the engine needs from a front end.
pub trait Presenter: KeySource {
    /// Top-level flow message
    fn log_main(&mut self, tone: Tone, text: &str);

    /// One line of agent output
    fn log_agent(&mut self, line: &AgentLine);

    /// Show the reviewer document at a checkpoint
    fn show_review(&mut self, cycle: Cycle, doc: &ReqapDocument);

    /// Block until the operator answers
    fn prompt_blocking(&mut self, prompt: &str) -> Result<String>;

    /// Run an external editor with the renderer suspended
    fn suspend_for_editor(&mut self, editor: &str, path: &Path) -> Result<()>;

    fn activity_started(&mut self, _label: &str) {}

    fn activity_tick(&mut self) {}

    fn activity_finished(&mut self) {}

    fn set_status(&mut self, _cycle: Cycle, _stage: Option<&str>, _paused: bool) {}
}

/// Editor to use: configured value, then `$EDITOR`, then `vi`.
pub fn editor_command(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()))
        .unwrap_or_else(|| "vi".to_string())
}

/// Run an editor command line on a file and wait for it.
pub fn run_editor(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| CyclerError::Config("editor command is empty".to_string()))?;

    info!("Opening {} in {}", path.display(), editor);
    let status = Command::new(program).args(parts).arg(path).status()?;
    if !status.success() {
        warn!("Editor {} exited with {}", editor, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_editor_command_prefers_configured() {
        assert_eq!(editor_command(Some("nano -w")), "nano -w");
    }

    #[test]
    fn test_run_editor_passes_path() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("edit.sh");
        fs::write(&script, "printf 'edited' > \"$1\"\n").unwrap();
        let target = dir.path().join("doc.md");
        fs::write(&target, "original").unwrap();

        run_editor(&format!("sh {}", script.display()), &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "edited");
    }

    #[test]
    fn test_run_editor_rejects_empty_command() {
        let err = run_editor("   ", Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, CyclerError::Config(_)));
    }

    #[test]
    fn test_run_editor_missing_program() {
        let err = run_editor("definitely-not-an-editor-xyz", Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, CyclerError::Io(_)));
    }
}
