//! CLI definition using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::checkpoint::GateMode;

/// Environment variable naming the default workspace.
pub const WORKSPACE_ENV: &str = "CYCLER_WORKSPACE";

/// Cycler - a plan, build and review cycle orchestrator
#[derive(Parser, Debug)]
#[command(name = "cycler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Continue through checkpoints without prompting
    #[arg(short, long)]
    pub auto: bool,

    /// Use the split-pane terminal interface
    #[arg(short, long)]
    pub tui: bool,

    /// Workspace directory (default: $CYCLER_WORKSPACE, else ./workspace)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Pipeline config file (default: <workspace>/config.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn gate_mode(&self) -> GateMode {
        if self.auto { GateMode::Auto } else { GateMode::Interactive }
    }

    /// Tag shown on headless console lines.
    pub fn mode_tag(&self) -> &'static str {
        if self.auto { "auto" } else { "live" }
    }

    /// Resolve the workspace: flag, then environment, then `./workspace`.
    pub fn workspace_dir(&self) -> PathBuf {
        Self::resolve_workspace(self.workspace.as_ref(), std::env::var(WORKSPACE_ENV).ok())
    }

    fn resolve_workspace(flag: Option<&PathBuf>, env: Option<String>) -> PathBuf {
        if let Some(dir) = flag {
            return dir.clone();
        }
        match env {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => PathBuf::from("workspace"),
        }
    }
}
