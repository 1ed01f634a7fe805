//! Per-cycle file layout.
//!
//! Every stage input and output is named deterministically by cycle number, so
//! re-running a cycle is just re-pointing at the same paths. Templates use
//! `{cycle}` as the only placeholder; relative results are anchored at the
//! workspace root.

use std::path::{Path, PathBuf};

use crate::domain::Cycle;

/// Substitute `{cycle}` in a template.
pub fn substitute(template: &str, cycle: Cycle) -> String {
    template.replace("{cycle}", &cycle.to_string())
}

/// Root directory all stages run in and all paths resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path template for a cycle.
    pub fn resolve(&self, template: &str, cycle: Cycle) -> PathBuf {
        let path = PathBuf::from(substitute(template, cycle));
        if path.is_absolute() { path } else { self.root.join(path) }
    }

    /// Log file for one stage of one cycle.
    pub fn stage_log_path(&self, log_dir: &str, cycle: Cycle, stage: &str) -> PathBuf {
        self.resolve(log_dir, cycle).join(format!("cycle{}_{}.log", cycle, stage))
    }
}
