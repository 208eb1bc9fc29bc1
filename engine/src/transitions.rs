//! Execution transition graph authority.
//!
//! This module is the single encoding point for named `ExecutionStatus` edges
//! and legality checks. The state machine delegates every status change here
//! instead of embedding the graph at its call sites.

use dotexec_types::ExecutionStatus;
use serde::Serialize;
use thiserror::Error;

/// Named edges of the execution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEdge {
    /// `pending -> signing` after a successful simulation.
    Simulated,
    /// `signing -> broadcasting` after the signer approved.
    Signed,
    /// `broadcasting -> in_block` once inclusion is observed.
    Included,
    /// `in_block -> finalized` once finality is observed.
    Finalize,
    /// Any in-flight state back to `pending` for the next attempt.
    Retry,
    Fail,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal execution transition {from} -> {to}")]
pub struct TransitionError {
    pub from: ExecutionStatus,
    pub to: ExecutionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionReceipt {
    from: ExecutionStatus,
    edge: ExecutionEdge,
    to: ExecutionStatus,
}

impl TransitionReceipt {
    #[must_use]
    pub const fn from(self) -> ExecutionStatus {
        self.from
    }

    #[must_use]
    pub const fn edge(self) -> ExecutionEdge {
        self.edge
    }

    #[must_use]
    pub const fn to(self) -> ExecutionStatus {
        self.to
    }
}

/// Resolve and validate the edge for `from -> to`.
pub fn transition_receipt(
    from: ExecutionStatus,
    to: ExecutionStatus,
) -> Result<TransitionReceipt, TransitionError> {
    transition_edge(from, to)
        .filter(|edge| is_legal_transition(from, *edge, to))
        .map(|edge| TransitionReceipt { from, edge, to })
        .ok_or(TransitionError { from, to })
}

#[must_use]
pub fn transition_edge(from: ExecutionStatus, to: ExecutionStatus) -> Option<ExecutionEdge> {
    use ExecutionEdge::{Cancel, Fail, Finalize, Included, Retry, Signed, Simulated};
    use ExecutionStatus::{Broadcasting, Cancelled, Failed, Finalized, InBlock, Pending, Signing};

    if from.is_terminal() {
        return None;
    }
    match (from, to) {
        (Pending, Signing) => Some(Simulated),
        (Signing, Broadcasting) => Some(Signed),
        (Broadcasting, InBlock) => Some(Included),
        (InBlock, Finalized) => Some(Finalize),
        (_, Pending) => Some(Retry),
        (_, Failed) => Some(Fail),
        (_, Cancelled) => Some(Cancel),
        _ => None,
    }
}

#[must_use]
pub fn is_legal_transition(
    from: ExecutionStatus,
    edge: ExecutionEdge,
    to: ExecutionStatus,
) -> bool {
    use ExecutionEdge::{Cancel, Fail, Finalize, Included, Retry, Signed, Simulated};
    use ExecutionStatus::{Broadcasting, Cancelled, Failed, Finalized, InBlock, Pending, Signing};

    if from.is_terminal() {
        return false;
    }
    match edge {
        Simulated => from == Pending && to == Signing,
        Signed => from == Signing && to == Broadcasting,
        Included => from == Broadcasting && to == InBlock,
        Finalize => from == InBlock && to == Finalized,
        Retry => to == Pending,
        Fail => to == Failed,
        Cancel => to == Cancelled,
    }
}
