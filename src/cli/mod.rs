//! CLI module for cycler - command-line flags.
//!
//! One command: run the plan, build and review pipeline in a workspace,
//! interactively or in auto mode, headless or in the split-pane TUI.

pub mod commands;

pub use commands::Cli;
