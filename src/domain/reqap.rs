//! Reviewer output documents.
//!
//! The reviewer stage writes a markdown document whose first line carries the
//! assessment (`Assessment: Success`). Reading it never fails: anything missing
//! or malformed degrades to `Assessment::Unknown`.

use log::warn;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Reviewer verdict for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assessment {
    Success,
    Partial,
    Failure,
    #[default]
    Unknown,
}

impl Assessment {
    /// Parse the assessment from the first line of a document.
    ///
    /// Tolerates markdown decoration such as `1. **Assessment:** \`Success\``.
    pub fn parse(content: &str) -> Self {
        let first = content.trim_start_matches('\u{feff}').lines().next().unwrap_or("");
        let cleaned: String = first.chars().filter(|c| !matches!(c, '*' | '`')).collect();
        let cleaned = cleaned
            .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | '#' | '>' | ' ' | '\t'))
            .trim_end();

        let Some(prefix) = cleaned.get(..11) else {
            return Self::Unknown;
        };
        if !prefix.eq_ignore_ascii_case("assessment:") {
            return Self::Unknown;
        }

        let token = cleaned[11..]
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric());

        match token.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "partial" => Self::Partial,
            "failure" => Self::Failure,
            _ => Self::Unknown,
        }
    }

    /// Instruction handed to the next planning stage on promotion.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Success => "Build on this success: keep what works and implement the suggested improvements.",
            Self::Partial => "Finish the incomplete work reported below before starting anything new.",
            Self::Failure => "Address every failure reported below before attempting new work.",
            Self::Unknown => "The previous outcome is unclear: re-evaluate the report below and decide what to fix.",
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "Success",
            Self::Partial => "Partial",
            Self::Failure => "Failure",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A reviewer document as read at a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqapDocument {
    pub path: PathBuf,
    /// File contents, `None` when the file could not be read
    pub content: Option<String>,
    pub assessment: Assessment,
}

impl ReqapDocument {
    /// Load a reviewer document. Never fails.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                let assessment = Assessment::parse(&content);
                Self {
                    path: path.to_path_buf(),
                    content: Some(content),
                    assessment,
                }
            }
            Err(e) => {
                warn!("Could not read reviewer output {}: {}", path.display(), e);
                Self {
                    path: path.to_path_buf(),
                    content: None,
                    assessment: Assessment::Unknown,
                }
            }
        }
    }

    /// Whether the file was readable (promotion requires it).
    pub fn is_readable(&self) -> bool {
        self.content.is_some()
    }

    /// Document text, empty when unreadable.
    pub fn body(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
