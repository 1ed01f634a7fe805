//! Cycler - a plan, build and review cycle orchestrator
//!
//! Cycler runs a fixed pipeline of external agent commands (planner, builder,
//! reviewer) once per cycle, stops at a checkpoint where the reviewer's
//! assessment is approved, edited or rejected, and promotes it into the next
//! cycle's planning input.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod mux;
pub mod orchestrator;
pub mod preflight;
pub mod presenter;
pub mod runner;
pub mod signals;
pub mod tui;
pub mod workspace;

pub use error::{CyclerError, Result};
