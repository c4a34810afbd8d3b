//! Progress reporting hooks
//!
//! The engine never prints. Callers that want to show what is happening
//! implement [`ProgressCallback`].

use crate::types::Operation;
use std::fmt;

/// Phase of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Puts for added entries
    Write,
    /// Deletes for removed entries
    Delete,
    /// Authoritative re-read of the desired entries
    ReadBack,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Write => write!(f, "write"),
            Phase::Delete => write!(f, "delete"),
            Phase::ReadBack => write!(f, "read-back"),
        }
    }
}

/// Progress callback for reconciliation
pub trait ProgressCallback {
    /// Called before a phase starts with the number of entries it covers
    fn on_phase_start(&mut self, phase: Phase, count: usize);

    /// Called after each performed or skipped operation
    fn on_operation(&mut self, operation: &Operation);

    /// Called when a phase finishes without error
    fn on_phase_complete(&mut self, phase: Phase);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _phase: Phase, _count: usize) {}
    fn on_operation(&mut self, _operation: &Operation) {}
    fn on_phase_complete(&mut self, _phase: Phase) {}
}

/// Progress callback that keeps every operation it sees
#[derive(Debug, Default)]
pub struct RecordProgress {
    pub phases: Vec<Phase>,
    pub operations: Vec<Operation>,
}

impl ProgressCallback for RecordProgress {
    fn on_phase_start(&mut self, phase: Phase, _count: usize) {
        self.phases.push(phase);
    }

    fn on_operation(&mut self, operation: &Operation) {
        self.operations.push(operation.clone());
    }

    fn on_phase_complete(&mut self, _phase: Phase) {}
}
