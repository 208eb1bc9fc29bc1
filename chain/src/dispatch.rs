//! Dispatch outcomes and their human-readable translation.

use serde::{Deserialize, Serialize};

/// An event emitted while a call executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub section: String,
    pub method: String,
}

impl ChainEvent {
    #[must_use]
    pub fn new(section: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
        }
    }
}

/// Result of executing a call, either on a fork or on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success {
        events: Vec<ChainEvent>,
    },
    /// A pallet-level error with its metadata docs.
    Module {
        section: String,
        name: String,
        docs: Vec<String>,
    },
    /// `DispatchError::Token(kind)`.
    Token(String),
    /// Any other `DispatchError` variant.
    Other(String),
    /// Rejected by the validity check before execution.
    Invalid(String),
}

impl DispatchOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn events(&self) -> &[ChainEvent] {
        match self {
            Self::Success { events } => events,
            _ => &[],
        }
    }

    /// Human-readable failure reason, `None` on success.
    ///
    /// | Outcome | Reason |
    /// |---------|--------|
    /// | `Module` | `section.name: docs` |
    /// | `Token` | `TokenError: <kind>` |
    /// | `Other` | `DispatchError: <kind>` |
    /// | `Invalid` | `InvalidTransaction: <kind>` |
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Module {
                section,
                name,
                docs,
            } => Some(format!("{section}.{name}: {}", docs.join(" "))),
            Self::Token(kind) => Some(format!("TokenError: {kind}")),
            Self::Other(kind) => Some(format!("DispatchError: {kind}")),
            Self::Invalid(kind) => Some(format!("InvalidTransaction: {kind}")),
        }
    }
}
