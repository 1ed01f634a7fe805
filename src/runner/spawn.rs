//! Explicit spawn configuration for a stage.
//!
//! The cycle number and stage metadata reach the child through this struct's
//! environment map; the parent's own environment is never mutated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AgentConfig;
use crate::domain::{Cycle, StageDefinition};
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Bytes written to the child's stdin, which is then closed
    pub stdin: Option<Vec<u8>>,
}

impl SpawnConfig {
    /// Build the spawn configuration for a stage in a given cycle.
    pub fn for_stage(
        stage: &StageDefinition,
        workspace: &Workspace,
        cycle: Cycle,
        agent: Option<&AgentConfig>,
    ) -> std::io::Result<Self> {
        let program = stage.program().unwrap_or_default();
        let program = if program.contains('/') && Path::new(program).is_relative() {
            workspace.root().join(program).to_string_lossy().into_owned()
        } else {
            program.to_string()
        };

        let mut env = BTreeMap::new();
        env.insert("CYCLE_NUM".to_string(), cycle.to_string());
        env.insert("STAGE_NAME".to_string(), stage.name.clone());
        env.insert(
            "WORKSPACE_ROOT".to_string(),
            workspace.root().to_string_lossy().into_owned(),
        );
        if let Some(agent) = agent {
            env.insert("AGENT_PROVIDER".to_string(), agent.provider.clone());
            if let Some(model) = &agent.model {
                env.insert("AGENT_MODEL".to_string(), model.clone());
            }
        }

        let stdin = match &stage.stdin {
            Some(path) => Some(fs::read(path)?),
            None => None,
        };

        Ok(Self {
            program,
            args: stage.args(),
            cwd: workspace.root().to_path_buf(),
            env,
            stdin,
        })
    }

    /// Command line for display and logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage(command: &[&str]) -> StageDefinition {
        StageDefinition {
            name: "planner".to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            input: PathBuf::from("/ws/tasq.d"),
            output: PathBuf::from("/ws/briq.d"),
            stdin: None,
            color: None,
        }
    }

    #[test]
    fn test_env_carries_cycle_and_agent() {
        let ws = Workspace::new("/ws");
        let agent = AgentConfig {
            provider: "openai".to_string(),
            model: Some("gpt-4o".to_string()),
        };
        let spawn = SpawnConfig::for_stage(&stage(&["sh", "plan.sh"]), &ws, Cycle::new(5), Some(&agent)).unwrap();

        assert_eq!(spawn.env.get("CYCLE_NUM").map(String::as_str), Some("5"));
        assert_eq!(spawn.env.get("STAGE_NAME").map(String::as_str), Some("planner"));
        assert_eq!(spawn.env.get("AGENT_MODEL").map(String::as_str), Some("gpt-4o"));
        assert_eq!(spawn.cwd, PathBuf::from("/ws"));
        assert_eq!(spawn.args, vec!["plan.sh", "/ws/tasq.d", "/ws/briq.d"]);
    }

    #[test]
    fn test_relative_program_anchored_at_workspace() {
        let ws = Workspace::new("/ws");
        let spawn = SpawnConfig::for_stage(&stage(&["./stages/plan.sh"]), &ws, Cycle::FIRST, None).unwrap();
        assert_eq!(spawn.program, "/ws/./stages/plan.sh");

        let spawn = SpawnConfig::for_stage(&stage(&["python3"]), &ws, Cycle::FIRST, None).unwrap();
        assert_eq!(spawn.program, "python3");
    }

    #[test]
    fn test_stdin_read_from_file() {
        let dir = TempDir::new().unwrap();
        let prompt = dir.path().join("prompt.txt");
        fs::write(&prompt, "hello").unwrap();
        let mut s = stage(&["cat"]);
        s.stdin = Some(prompt);

        let spawn = SpawnConfig::for_stage(&s, &Workspace::new(dir.path()), Cycle::FIRST, None).unwrap();
        assert_eq!(spawn.stdin.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_missing_stdin_file_errors() {
        let dir = TempDir::new().unwrap();
        let mut s = stage(&["cat"]);
        s.stdin = Some(dir.path().join("nope"));
        assert!(SpawnConfig::for_stage(&s, &Workspace::new(dir.path()), Cycle::FIRST, None).is_err());
    }
}
