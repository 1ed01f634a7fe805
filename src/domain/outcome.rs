//! Session outcome types.
//!
//! This module defines how a whole orchestration session ended and how that
//! maps onto the final summary and process exit code.

use std::fmt;
use std::path::PathBuf;

use crate::preflight::MissingTool;

/// Outcome of an orchestration session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Operator chose to stop at a checkpoint
    Completed,
    /// Auto mode hit its cycle ceiling
    LimitReached { limit: u32 },
    /// Soft interrupt from the operator
    Aborted,
    /// Hard kill from the operator
    Killed,
    /// A stage failed or promotion could not be written
    Failed(String),
    /// Pipeline configuration missing or malformed
    ConfigError(String),
    /// Required tools missing on the search path
    PreflightFailed(Vec<MissingTool>),
    /// The cycle's input file does not exist
    MissingInput(PathBuf),
}

/// The three summaries an operator sees at the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Finished,
    UserAborted,
    Errors,
}

impl SessionOutcome {
    pub fn summary_kind(&self) -> SummaryKind {
        match self {
            Self::Completed | Self::LimitReached { .. } => SummaryKind::Finished,
            Self::Aborted | Self::Killed => SummaryKind::UserAborted,
            Self::Failed(_) | Self::ConfigError(_) | Self::PreflightFailed(_) | Self::MissingInput(_) => {
                SummaryKind::Errors
            }
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed | Self::LimitReached { .. } => 0,
            Self::Aborted => 130,
            Self::Killed => 137,
            _ => 1,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "session finished"),
            Self::LimitReached { limit } => write!(f, "cycle limit reached ({})", limit),
            Self::Aborted => write!(f, "session ended by user"),
            Self::Killed => write!(f, "session killed by user"),
            Self::Failed(reason) => write!(f, "session ended with errors: {}", reason),
            Self::ConfigError(reason) => write!(f, "configuration error: {}", reason),
            Self::PreflightFailed(missing) => {
                let names: Vec<String> = missing.iter().map(|m| m.to_string()).collect();
                write!(f, "missing tools: {}", names.join(", "))
            }
            Self::MissingInput(path) => write!(f, "missing cycle input: {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_kinds() {
        assert_eq!(SessionOutcome::Completed.summary_kind(), SummaryKind::Finished);
        assert_eq!(SessionOutcome::LimitReached { limit: 2 }.summary_kind(), SummaryKind::Finished);
        assert_eq!(SessionOutcome::Aborted.summary_kind(), SummaryKind::UserAborted);
        assert_eq!(SessionOutcome::Killed.summary_kind(), SummaryKind::UserAborted);
        assert_eq!(SessionOutcome::Failed("x".into()).summary_kind(), SummaryKind::Errors);
    }

    #[test]
    fn test_exit_codes_distinguish_abort_and_kill() {
        assert_eq!(SessionOutcome::Completed.exit_code(), 0);
        assert_eq!(SessionOutcome::Aborted.exit_code(), 130);
        assert_eq!(SessionOutcome::Killed.exit_code(), 137);
        assert_eq!(SessionOutcome::ConfigError("bad".into()).exit_code(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SessionOutcome::LimitReached { limit: 2 }.to_string(),
            "cycle limit reached (2)"
        );
    }
}
