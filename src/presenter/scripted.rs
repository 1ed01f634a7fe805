//! Presenter without a terminal.
//!
//! Answers prompts from a queue, delivers keys after a given number of polls,
//! and records everything it is asked to show. Used to drive the engine from
//! tests and from embedding code that has no operator attached.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::{AgentLine, KeyCommand, KeySource, Presenter, Tone, run_editor};
use crate::domain::{Assessment, Cycle, ReqapDocument};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    answers: VecDeque<String>,
    pending_keys: VecDeque<(usize, KeyCommand)>,
    polls: usize,
    /// Flow messages in order
    pub main_lines: Vec<(Tone, String)>,
    /// Agent lines in order
    pub agent_lines: Vec<AgentLine>,
    /// Assessments shown at checkpoints
    pub reviews: Vec<(Cycle, Assessment)>,
    /// Prompts that were asked
    pub prompts: Vec<String>,
    /// Files opened in an editor
    pub edited: Vec<PathBuf>,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for `prompt_blocking`; when exhausted the answer is "x".
    pub fn with_answers<I, S>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.answers.extend(answers.into_iter().map(Into::into));
        self
    }

    /// Deliver `key` on the `after`-th call to `poll_key` (counting from 1).
    pub fn with_key_after(mut self, after: usize, key: KeyCommand) -> Self {
        self.pending_keys.push_back((after, key));
        self
    }

    pub fn main_text(&self) -> String {
        self.main_lines
            .iter()
            .map(|(_, t)| t.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl KeySource for ScriptedPresenter {
    fn poll_key(&mut self) -> Result<Option<KeyCommand>> {
        self.polls += 1;
        match self.pending_keys.front() {
            Some((after, key)) if self.polls >= *after => {
                let key = *key;
                self.pending_keys.pop_front();
                Ok(Some(key))
            }
            _ => Ok(None),
        }
    }
}

impl Presenter for ScriptedPresenter {
    fn log_main(&mut self, tone: Tone, text: &str) {
        self.main_lines.push((tone, text.to_string()));
    }

    fn log_agent(&mut self, line: &AgentLine) {
        self.agent_lines.push(line.clone());
    }

    fn show_review(&mut self, cycle: Cycle, doc: &ReqapDocument) {
        self.reviews.push((cycle, doc.assessment));
    }

    fn prompt_blocking(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or_else(|| "x".to_string()))
    }

    fn suspend_for_editor(&mut self, editor: &str, path: &Path) -> Result<()> {
        self.edited.push(path.to_path_buf());
        run_editor(editor, path)
    }
}
