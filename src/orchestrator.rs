//! Orchestration loop.
//!
//! Drives cycles of sequential stages followed by a checkpoint until the
//! operator stops, a stage fails, the auto ceiling is reached, or the session
//! is interrupted. Every exit path is a [`SessionOutcome`]; nothing here
//! panics or exits the process.

use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::checkpoint::{CheckpointGate, GateDecision, GateMode};
use crate::config::PipelineConfig;
use crate::domain::{Cycle, SessionOutcome, SessionState, StageDefinition, StageOutcome};
use crate::error::CyclerError;
use crate::preflight;
use crate::presenter::{KeyCommand, Presenter, Tone, editor_command};
use crate::runner::{AgentRunner, RunnerConfig, SpawnConfig};
use crate::workspace::Workspace;

/// Where a checkpoint promotes to for `cycle`'s successor.
///
/// `pipeline.cycle_input` when configured, else the first stage's input. When
/// that resolves to a directory the document is written inside it.
pub fn promotion_target(config: &PipelineConfig, workspace: &Workspace, cycle: Cycle) -> Option<PathBuf> {
    let next = cycle.next();
    let target = match config.cycle_input(workspace, next) {
        Some(path) => path,
        None => config.resolve_stages(workspace, next).first()?.input.clone(),
    };
    if target.is_dir() {
        Some(target.join(format!("cycle{}_input.md", next)))
    } else {
        Some(target)
    }
}

pub struct Orchestrator {
    workspace: Workspace,
    config_path: Option<PathBuf>,
    mode: GateMode,
}

impl Orchestrator {
    pub fn new(workspace: Workspace, config_path: Option<PathBuf>, mode: GateMode) -> Self {
        Self {
            workspace,
            config_path,
            mode,
        }
    }

    fn load_config(&self) -> Result<PipelineConfig, String> {
        let path = PipelineConfig::locate(self.config_path.as_ref(), &self.workspace).ok_or_else(|| {
            format!(
                "no pipeline config found (looked for {})",
                self.workspace.root().join(crate::config::WORKSPACE_CONFIG).display()
            )
        })?;
        PipelineConfig::load(&path).map_err(|e| match e {
            CyclerError::Config(msg) => msg,
            other => other.to_string(),
        })
    }

    /// Run the session to completion.
    pub async fn run(&self, presenter: &mut dyn Presenter) -> SessionOutcome {
        let mode_label = match self.mode {
            GateMode::Auto => "auto",
            GateMode::Interactive => "interactive",
        };
        info!("Session starting in {} mode at {}", mode_label, self.workspace.root().display());

        let config = match self.load_config() {
            Ok(config) => config,
            Err(msg) => {
                error!("Configuration error: {}", msg);
                presenter.log_main(Tone::Error, &format!("Configuration error: {}", msg));
                return SessionOutcome::ConfigError(msg);
            }
        };

        let missing = preflight::check(&config, &self.workspace);
        if !missing.is_empty() {
            presenter.log_main(Tone::Error, "Pre-flight failed, missing tools:");
            for tool in &missing {
                presenter.log_main(Tone::Error, &format!("  - {}", tool));
            }
            return SessionOutcome::PreflightFailed(missing);
        }
        presenter.log_main(Tone::Success, "Pre-flight passed");

        let mut state = SessionState::new();
        let mut ended = None;
        while !state.is_stopped() {
            match self.run_cycle(state.cycle, presenter).await {
                Some(outcome) => {
                    state.stop_with(&outcome);
                    ended = Some(outcome);
                }
                None => state.advance(),
            }
        }

        let outcome = ended.unwrap_or(SessionOutcome::Completed);
        if state.user_aborted {
            presenter.log_main(Tone::Warning, &format!("Session aborted in cycle {}", state.cycle));
        }
        info!("Session ended after cycle {}: {}", state.cycle, outcome);
        outcome
    }

    /// One cycle. `None` means continue with the next cycle.
    async fn run_cycle(&self, cycle: Cycle, presenter: &mut dyn Presenter) -> Option<SessionOutcome> {

        // reloaded every cycle so edits between cycles take effect
        let config = match self.load_config() {
            Ok(config) => config,
            Err(msg) => {
                presenter.log_main(Tone::Error, &format!("Configuration error: {}", msg));
                return Some(SessionOutcome::ConfigError(msg));
            }
        };

        let limit = config.options.auto_cycle_limit;
        if self.mode == GateMode::Auto && limit > 0 && cycle.get() > limit {
            presenter.log_main(Tone::Info, &format!("Auto cycle limit of {} reached", limit));
            return Some(SessionOutcome::LimitReached { limit });
        }

        if let Some(input) = config.cycle_input(&self.workspace, cycle) {
            if !input.exists() {
                presenter.log_main(Tone::Error, &format!("Cycle input missing: {}", input.display()));
                return Some(SessionOutcome::MissingInput(input));
            }
        }

        presenter.log_main(Tone::Header, &format!("=== Cycle {} ===", cycle));
        presenter.set_status(cycle, None, false);

        let stages = config.resolve_stages(&self.workspace, cycle);
        let runner = AgentRunner::new(RunnerConfig::from_options(&config.options));

        for stage in &stages {
            match presenter.poll_key() {
                Ok(Some(KeyCommand::Interrupt)) => {
                    presenter.log_main(Tone::Warning, "Interrupted, stopping before next stage");
                    return Some(SessionOutcome::Aborted);
                }
                Ok(Some(KeyCommand::Kill)) => {
                    return Some(SessionOutcome::Killed);
                }
                Ok(_) => {}
                Err(e) => warn!("key polling failed: {}", e),
            }

            match self.run_stage(&runner, &config, cycle, stage, presenter).await {
                StageOutcome::Succeeded(_) => {}
                StageOutcome::Failed { stage, failure } => {
                    let reason = format!("stage {} failed in cycle {}: {}", stage, cycle, failure);
                    presenter.log_main(Tone::Error, &reason);
                    return Some(SessionOutcome::Failed(reason));
                }
                StageOutcome::Cancelled => {
                    presenter.log_main(Tone::Warning, "Interrupted, stage terminated");
                    return Some(SessionOutcome::Aborted);
                }
                StageOutcome::Killed => {
                    return Some(SessionOutcome::Killed);
                }
            }
        }

        let Some(last) = stages.last() else {
            return Some(SessionOutcome::ConfigError("pipeline has no stages".to_string()));
        };
        let Some(next_input) = promotion_target(&config, &self.workspace, cycle) else {
            return Some(SessionOutcome::ConfigError("no promotion target".to_string()));
        };

        let gate = CheckpointGate::new(self.mode, editor_command(config.options.editor.as_deref()));
        presenter.set_status(cycle, Some("checkpoint"), false);
        match gate.run(cycle, &last.output, &next_input, presenter) {
            Ok(GateDecision::Continue(path)) => {
                info!("Cycle {} promoted to {}", cycle, path.display());
                None
            }
            Ok(GateDecision::Stop) => {
                Some(SessionOutcome::Completed)
            }
            Ok(GateDecision::Abort) => {
                Some(SessionOutcome::Aborted)
            }
            Err(e) => {
                presenter.log_main(Tone::Error, &format!("Checkpoint failed: {}", e));
                Some(SessionOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn run_stage(
        &self,
        runner: &AgentRunner,
        config: &PipelineConfig,
        cycle: Cycle,
        stage: &StageDefinition,
        presenter: &mut dyn Presenter,
    ) -> StageOutcome {
        let spawn = match SpawnConfig::for_stage(stage, &self.workspace, cycle, config.agent(&stage.name)) {
            Ok(spawn) => spawn,
            Err(e) => {
                let path = stage.stdin.as_deref().unwrap_or(Path::new("?"));
                presenter.log_main(
                    Tone::Error,
                    &format!("[{}] cannot read stdin file {}: {}", stage.name, path.display(), e),
                );
                return StageOutcome::Failed {
                    stage: stage.name.clone(),
                    failure: crate::domain::StageFailure::Io(e.to_string()),
                };
            }
        };
        let log_path = self
            .workspace
            .stage_log_path(&config.options.log_dir, cycle, &stage.name);
        runner.run(cycle, stage, spawn, &log_path, presenter).await
    }
}
