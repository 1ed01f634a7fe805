//! Stage runner module.
//!
//! This module launches pipeline stages as child processes:
//! - AgentRunner drives one stage through the stream multiplexer
//! - SpawnConfig carries the explicit program, arguments and environment
//! - StageLog mirrors every raw output line to the per-stage log file

mod agent;
mod log_file;
mod spawn;

pub use agent::{AgentRunner, RunnerConfig, classify_line};
pub use log_file::StageLog;
pub use spawn::SpawnConfig;
