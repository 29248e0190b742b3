//! Per-invocation progress and results.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use super::error::ReconcileError;
use crate::domain::{Kind, ObjectKey};

/// Stage of a single reconcile invocation.
///
/// `Fetching → Diffing → Writing → Done` is the main path. A missing target
/// goes straight from `Fetching` to `Done`, a child that needs nothing goes
/// from `Diffing` back to `Fetching` (next child) or to `Done`, and any
/// unrecoverable error ends in `Failed`. Nothing survives the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetching,
    Diffing,
    Writing,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Whether `self → next` is a legal step
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Fetching, Diffing | Done) => true,
            (Diffing, Writing | Fetching | Done) => true,
            (Writing, Fetching | Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetching => "fetching",
            Phase::Diffing => "diffing",
            Phase::Writing => "writing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the phase of one invocation and traces every step
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    pub(crate) fn start() -> Self {
        Self {
            phase: Phase::Fetching,
        }
    }

    pub(crate) fn current(&self) -> Phase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: Phase) {
        if self.phase == next {
            return;
        }
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {} -> {}",
            self.phase,
            next
        );
        trace!(from = %self.phase, to = %next, "phase");
        self.phase = next;
    }

    /// Record the failure and hand the error back
    pub(crate) fn fail(&mut self, error: ReconcileError) -> ReconcileError {
        self.advance(Phase::Failed);
        error
    }
}

/// How an invocation ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// Every child the target implies matches its derivation
    Converged,

    /// The target record does not exist; nothing to do
    TargetMissing,

    /// The planet carries no back-reference label, so no galaxy manages it
    Unmanaged,

    /// The planet's galaxy no longer lists its item; left as is
    Orphaned,
}

/// What a successful invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub kind: Kind,
    pub target: ObjectKey,
    pub status: ReconcileStatus,
    pub created: Vec<ObjectKey>,
    pub updated: Vec<ObjectKey>,
    pub unchanged: Vec<ObjectKey>,
}

impl ReconcileReport {
    pub(crate) fn new(kind: Kind, target: ObjectKey, status: ReconcileStatus) -> Self {
        Self {
            kind,
            target,
            status,
            created: Vec::new(),
            updated: Vec::new(),
            unchanged: Vec::new(),
        }
    }

    /// Number of records this invocation wrote
    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}
