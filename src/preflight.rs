//! Pre-flight tool resolution.
//!
//! Before any stage runs, every program the pipeline needs must be resolvable:
//! each stage's own executable and the binary behind its AI provider. All
//! missing tools are collected and reported together.

use log::{debug, info};
use std::fmt;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::domain::Cycle;
use crate::workspace::Workspace;

/// One tool that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    pub stage: String,
    /// Provider name, `None` when the stage's own executable is missing
    pub provider: Option<String>,
    pub tool: String,
}

impl fmt::Display for MissingTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{} (stage {}, provider {})", self.tool, self.stage, provider),
            None => write!(f, "{} (stage {})", self.tool, self.stage),
        }
    }
}

/// Resolve a program the way a spawn from `workspace` would.
///
/// Names containing a path separator are checked relative to the workspace;
/// bare names are looked up on `PATH`.
pub fn resolve_program(program: &str, workspace: &Workspace) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = Path::new(program);
        let full = if path.is_absolute() { path.to_path_buf() } else { workspace.root().join(path) };
        return full.is_file();
    }
    which::which(program).is_ok()
}

/// Check every stage executable and provider tool; returns all that are missing.
pub fn check(config: &PipelineConfig, workspace: &Workspace) -> Vec<MissingTool> {
    let mut missing = Vec::new();

    for stage in config.resolve_stages(workspace, Cycle::FIRST) {
        if let Some(program) = stage.program() {
            if !resolve_program(program, workspace) {
                debug!("preflight: stage {} program {} not found", stage.name, program);
                missing.push(MissingTool {
                    stage: stage.name.clone(),
                    provider: None,
                    tool: program.to_string(),
                });
            }
        }

        if let Some(agent) = config.agent(&stage.name) {
            match config.provider_tool(&agent.provider) {
                Some(tool) if resolve_program(&tool, workspace) => {}
                Some(tool) => missing.push(MissingTool {
                    stage: stage.name.clone(),
                    provider: Some(agent.provider.clone()),
                    tool,
                }),
                None => missing.push(MissingTool {
                    stage: stage.name.clone(),
                    provider: Some(agent.provider.clone()),
                    tool: format!("<unknown provider {}>", agent.provider),
                }),
            }
        }
    }

    if missing.is_empty() {
        info!("Pre-flight passed for {} stages", config.pipeline.stages.len());
    }
    missing
}
