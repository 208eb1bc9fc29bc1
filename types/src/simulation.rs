//! Dry-run outcomes.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, BlockHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaDirection {
    Send,
    Receive,
}

/// Predicted net change of one account's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub account: AccountId,
    pub direction: DeltaDirection,
    pub amount: u128,
}

impl BalanceDelta {
    /// Build a delta from a signed net change. Zero change yields `None`.
    #[must_use]
    pub fn from_net_change(account: AccountId, before: u128, after: u128) -> Option<Self> {
        match after.cmp(&before) {
            Ordering::Equal => None,
            Ordering::Less => Some(Self {
                account,
                direction: DeltaDirection::Send,
                amount: before - after,
            }),
            Ordering::Greater => Some(Self {
                account,
                direction: DeltaDirection::Receive,
                amount: after - before,
            }),
        }
    }
}

/// Predicted effect of a call, computed against forked chain state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub success: bool,
    pub failure_reason: Option<String>,
    /// Estimated fee in planck. Zero when estimation failed.
    pub estimated_fee: u128,
    pub balance_deltas: Vec<BalanceDelta>,
    /// Block the fork was pinned at, when a fork was opened.
    pub block_hash: Option<BlockHash>,
}

impl SimulationResult {
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_reason: Some(reason.into()),
            estimated_fee: 0,
            balance_deltas: Vec::new(),
            block_hash: None,
        }
    }
}

/// Coarse phase of an in-flight simulation, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    Initializing,
    Forking,
    Executing,
    Analyzing,
    Complete,
    Error,
}

impl SimulationPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Forking => "forking",
            Self::Executing => "executing",
            Self::Analyzing => "analyzing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Progress percentage reported when the phase is entered.
    #[must_use]
    pub const fn progress(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Forking => 15,
            Self::Executing => 45,
            Self::Analyzing => 75,
            Self::Complete | Self::Error => 100,
        }
    }
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (phase, message, progress) tuple exposed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub phase: SimulationPhase,
    pub message: String,
    pub progress: u8,
}

impl SimulationProgress {
    #[must_use]
    pub fn new(phase: SimulationPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            progress: phase.progress(),
        }
    }
}
