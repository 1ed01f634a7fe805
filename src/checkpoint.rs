//! Checkpoint gate between cycles.
//!
//! Shows the reviewer document, asks the operator (or decides automatically)
//! and promotes the document into the next cycle's planning input.

use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::domain::{Cycle, ReqapDocument};
use crate::error::{CyclerError, Result};
use crate::presenter::{Presenter, Tone};

/// Prompt shown at an interactive checkpoint.
pub const CHECKPOINT_PROMPT: &str = "[c]ontinue  [t]weak (edit)  [x] quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Auto,
    Interactive,
}

/// What the session should do after a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Promoted; run the next cycle
    Continue(PathBuf),
    /// Operator quit without promoting
    Stop,
    /// Operator pressed Ctrl-C at the prompt
    Abort,
}

enum Answer {
    Continue,
    Tweak,
    Quit,
    Abort,
    Unrecognized,
}

fn parse_answer(raw: &str) -> Answer {
    match raw.trim().to_lowercase().as_str() {
        "\u{3}" => Answer::Abort,
        "c" | "continue" => Answer::Continue,
        "t" | "tweak" => Answer::Tweak,
        "x" | "q" | "quit" => Answer::Quit,
        _ => Answer::Unrecognized,
    }
}

/// Render the promoted document. Pure; identical inputs give identical bytes.
pub fn render_promotion(cycle: Cycle, doc: &ReqapDocument) -> String {
    format!(
        "# Cycle {}\n\n> Previous assessment (cycle {}): {}\n> {}\n\n{}",
        cycle.next(),
        cycle,
        doc.assessment,
        doc.assessment.directive(),
        doc.body()
    )
}

/// Write the promoted document to `dst` atomically.
pub fn promote(cycle: Cycle, doc: &ReqapDocument, dst: &Path) -> Result<PathBuf> {
    if !doc.is_readable() {
        return Err(CyclerError::Promotion(format!(
            "reviewer output {} is not readable",
            doc.path.display()
        )));
    }

    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .map_err(|e| CyclerError::Promotion(format!("cannot create {}: {}", parent.display(), e)))?;

    let content = render_promotion(cycle, doc);
    let mut tmp = NamedTempFile::new_in(&parent)
        .map_err(|e| CyclerError::Promotion(format!("cannot stage {}: {}", dst.display(), e)))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| CyclerError::Promotion(format!("cannot write {}: {}", dst.display(), e)))?;
    tmp.persist(dst)
        .map_err(|e| CyclerError::Promotion(format!("cannot replace {}: {}", dst.display(), e.error)))?;

    info!("Promoted {} -> {} ({})", doc.path.display(), dst.display(), doc.assessment);
    Ok(dst.to_path_buf())
}

/// The gate run once per successful cycle.
#[derive(Debug, Clone)]
pub struct CheckpointGate {
    mode: GateMode,
    editor: String,
}

impl CheckpointGate {
    pub fn new(mode: GateMode, editor: impl Into<String>) -> Self {
        Self {
            mode,
            editor: editor.into(),
        }
    }

    /// Review the cycle's reviewer document and decide how to proceed.
    ///
    /// Promotion errors are returned; everything else is a decision.
    pub fn run(
        &self,
        cycle: Cycle,
        reqap_path: &Path,
        next_input: &Path,
        presenter: &mut dyn Presenter,
    ) -> Result<GateDecision> {
        let mut doc = ReqapDocument::load(reqap_path);
        presenter.show_review(cycle, &doc);

        if self.mode == GateMode::Auto {
            presenter.log_main(
                Tone::Info,
                &format!("Auto-continuing with assessment {}", doc.assessment),
            );
            let path = promote(cycle, &doc, next_input)?;
            return Ok(GateDecision::Continue(path));
        }

        loop {
            let raw = presenter.prompt_blocking(CHECKPOINT_PROMPT)?;
            debug!("checkpoint {} answer {:?}", cycle, raw);
            match parse_answer(&raw) {
                Answer::Continue => {
                    let path = promote(cycle, &doc, next_input)?;
                    presenter.log_main(Tone::Success, &format!("Promoted to {}", path.display()));
                    return Ok(GateDecision::Continue(path));
                }
                Answer::Quit => {
                    presenter.log_main(Tone::Info, "Stopping at checkpoint");
                    return Ok(GateDecision::Stop);
                }
                Answer::Abort => return Ok(GateDecision::Abort),
                Answer::Tweak => {
                    presenter.log_main(Tone::Info, &format!("Editing {}", reqap_path.display()));
                    if let Err(e) = presenter.suspend_for_editor(&self.editor, reqap_path) {
                        presenter.log_main(Tone::Error, &format!("Editor failed: {}", e));
                    }
                    doc = ReqapDocument::load(reqap_path);
                    presenter.show_review(cycle, &doc);
                }
                Answer::Unrecognized => {
                    presenter.log_main(Tone::Warning, &format!("Unrecognized choice {:?}", raw.trim()));
                }
            }
        }
    }
}
