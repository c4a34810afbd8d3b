//! Execution engine for consul-keys
//!
//! The engine orchestrates:
//! 1. Planning - Predict operations per resource from manifest and state
//! 2. Executing - Resolve scope and token, then run the reconciliation mode
//! 3. Reporting - Progress and plan display

pub mod differ;
pub mod executor;
pub mod progress;

pub use differ::{PlanMode, ResourcePlan, display_plans};
pub use executor::{ExecuteOptions, Executor, confirm_proceed, needs_replacement};
pub use progress::TerminalProgress;
