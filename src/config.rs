//! Pipeline configuration.
//!
//! Loaded from YAML and re-read at the start of every cycle, so the pipeline
//! shape may change between cycles.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Cycle, StageDefinition};
use crate::error::{CyclerError, Result};
use crate::workspace::{Workspace, substitute};

/// Name of the per-workspace config file.
pub const WORKSPACE_CONFIG: &str = "config.yaml";

/// Stdout markers surfaced to the operator when nothing else is configured.
pub const DEFAULT_SURFACE_MARKERS: &[&str] = &[
    "processing",
    "wrote",
    "written",
    "handing off",
    "executed",
    "checking",
    "generating",
    "ingesting",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub agents: HashMap<String, AgentConfig>,
    pub providers: HashMap<String, String>,
    pub options: OptionsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Input of a cycle's first stage; also where promotion writes
    pub cycle_input: Option<String>,
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub command: String,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// What to do when a stage exits 0 but leaves no output behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyOutputPolicy {
    /// Warn and treat the stage as successful
    #[default]
    Accept,
    /// Treat the stage as failed
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Maximum cycles in auto mode, 0 = unlimited
    pub auto_cycle_limit: u32,
    pub poll_interval_ms: u64,
    pub empty_output: EmptyOutputPolicy,
    pub log_dir: String,
    pub editor: Option<String>,
    pub surface_markers: Vec<String>,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            auto_cycle_limit: 0,
            poll_interval_ms: 50,
            empty_output: EmptyOutputPolicy::Accept,
            log_dir: "logs".to_string(),
            editor: None,
            surface_markers: DEFAULT_SURFACE_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Built-in provider to binary mapping.
fn builtin_provider_tool(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some("sgpt"),
        "gemini" => Some("gemini"),
        _ => None,
    }
}

impl PipelineConfig {
    /// Locate the config file: explicit path, workspace file, then
    /// `<user config dir>/cycler/cycler.yml`.
    pub fn locate(explicit: Option<&PathBuf>, workspace: &Workspace) -> Option<PathBuf> {
        Self::locate_with(explicit, workspace, dirs::config_dir())
    }

    fn locate_with(explicit: Option<&PathBuf>, workspace: &Workspace, config_dir: Option<PathBuf>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.clone());
        }

        let in_workspace = workspace.root().join(WORKSPACE_CONFIG);
        if in_workspace.exists() {
            return Some(in_workspace);
        }

        if let Some(config_dir) = config_dir {
            let project_name = env!("CARGO_PKG_NAME");
            let primary = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary.exists() {
                return Some(primary);
            }
        }

        warn!("No pipeline config found for workspace {}", workspace.root().display());
        None
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CyclerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&content)
            .map_err(|e| CyclerError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded pipeline config from: {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.stages.is_empty() {
            return Err(CyclerError::Config("pipeline.stages is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for stage in &self.pipeline.stages {
            if stage.name.trim().is_empty() {
                return Err(CyclerError::Config("stage with empty name".to_string()));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(CyclerError::Config(format!("duplicate stage name: {}", stage.name)));
            }
            if stage.command.split_whitespace().next().is_none() {
                return Err(CyclerError::Config(format!("stage {} has an empty command", stage.name)));
            }
        }
        if self.options.poll_interval_ms == 0 {
            return Err(CyclerError::Config("options.poll_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Resolve the ordered stage list for one cycle.
    pub fn resolve_stages(&self, workspace: &Workspace, cycle: Cycle) -> Vec<StageDefinition> {
        self.pipeline
            .stages
            .iter()
            .map(|stage| StageDefinition {
                name: stage.name.clone(),
                command: stage
                    .command
                    .split_whitespace()
                    .map(|part| substitute(part, cycle))
                    .collect(),
                input: workspace.resolve(&stage.input, cycle),
                output: workspace.resolve(&stage.output, cycle),
                stdin: stage.stdin.as_deref().map(|t| workspace.resolve(t, cycle)),
                color: stage.color.clone(),
            })
            .collect()
    }

    /// Path a cycle's first stage expects to exist (and promotion writes to).
    pub fn cycle_input(&self, workspace: &Workspace, cycle: Cycle) -> Option<PathBuf> {
        self.pipeline.cycle_input.as_deref().map(|t| workspace.resolve(t, cycle))
    }

    /// Binary name a provider needs, user mapping first.
    pub fn provider_tool(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .cloned()
            .or_else(|| builtin_provider_tool(provider).map(str::to_string))
    }

    pub fn agent(&self, stage: &str) -> Option<&AgentConfig> {
        self.agents.get(stage)
    }
}
