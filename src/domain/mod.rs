//! Domain types for Cycler
//!
//! This module contains the core domain types:
//! - Cycle: monotonically increasing pass counter
//! - StageDefinition / StageResult / StageOutcome: one external stage invocation
//! - ReqapDocument / Assessment: the reviewer's verdict
//! - SessionState / SessionOutcome: whole-session bookkeeping

pub mod cycle;
pub mod outcome;
pub mod reqap;
pub mod session;
pub mod stage;

pub use cycle::Cycle;
pub use outcome::{SessionOutcome, SummaryKind};
pub use reqap::{Assessment, ReqapDocument};
pub use session::SessionState;
pub use stage::{StageDefinition, StageFailure, StageOutcome, StageResult};
