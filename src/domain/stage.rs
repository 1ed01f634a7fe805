//! Stage definitions, results and outcomes.
//!
//! A stage is a single external command invocation (plan, build or review).
//! Definitions are resolved fresh from configuration every cycle; results only
//! live long enough for the loop to decide whether to continue.

use std::fmt;
use std::path::PathBuf;

/// A stage resolved for one specific cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    /// Stage identifier (also used for log file names)
    pub name: String,
    /// Program followed by template arguments, already `{cycle}`-substituted
    pub command: Vec<String>,
    /// Input location passed as the first positional argument
    pub input: PathBuf,
    /// Output location passed as the second positional argument
    pub output: PathBuf,
    /// Optional file whose contents are fed to the child's stdin
    pub stdin: Option<PathBuf>,
    /// Advisory display color name
    pub color: Option<String>,
}

impl StageDefinition {
    /// Program to execute (first element of the command).
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Full argument vector passed to the program: template args, input, output.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.command.iter().skip(1).cloned().collect();
        args.push(self.input.to_string_lossy().into_owned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// What a finished stage produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: String,
    pub exit_code: Option<i32>,
    pub stdout_lines: Vec<String>,
    pub stderr: String,
    pub log_path: PathBuf,
}

/// Why a stage did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    /// The program could not be found
    MissingExecutable(String),
    /// Spawning failed for another reason
    Spawn(String),
    /// Child exited with a non-zero status
    ExitCode(i32),
    /// Child was terminated by a signal it did not ask for
    Signal,
    /// Child exited 0 but left no output and the empty-output policy rejects that
    EmptyOutput(PathBuf),
    /// The runner itself hit an IO error
    Io(String),
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExecutable(p) => write!(f, "executable not found: {}", p),
            Self::Spawn(e) => write!(f, "failed to spawn: {}", e),
            Self::ExitCode(c) => write!(f, "exited with code {}", c),
            Self::Signal => write!(f, "terminated by signal"),
            Self::EmptyOutput(p) => write!(f, "produced no output at {}", p.display()),
            Self::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

/// Outcome of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded(StageResult),
    Failed { stage: String, failure: StageFailure },
    /// Soft interrupt from the operator
    Cancelled,
    /// Hard kill from the operator
    Killed,
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}
