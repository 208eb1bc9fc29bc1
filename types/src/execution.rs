//! Execution lifecycle types shared between the engine and its observers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::{AssetRef, ChainClass};
use crate::ids::{AccountId, BlockHash, ExecutionId, TxHash};
use crate::simulation::SimulationProgress;

/// Lifecycle state of one execution.
///
/// Success path: `Pending -> Signing -> Broadcasting -> InBlock -> Finalized`.
/// `Failed` and `Cancelled` are absorbing and reachable from every
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Signing,
    Broadcasting,
    InBlock,
    Finalized,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signing => "signing",
            Self::Broadcasting => "broadcasting",
            Self::InBlock => "in_block",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn all() -> &'static [ExecutionStatus] {
        &[
            Self::Pending,
            Self::Signing,
            Self::Broadcasting,
            Self::InBlock,
            Self::Finalized,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user approved: move `amount` of `asset` from `sender` to `recipient`.
///
/// The call builder turns this into a concrete call for whichever chain the
/// engine is currently targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub sender: AccountId,
    pub recipient: AccountId,
    /// Amount in planck.
    pub amount: u128,
    pub asset: AssetRef,
    /// Caller explicitly requires the keep-alive variant.
    #[serde(default)]
    pub keep_alive: bool,
    /// Chain class the first attempt targets.
    pub chain: ChainClass,
}

/// Proof of inclusion for a terminal success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tx_hash: TxHash,
    pub block_hash: BlockHash,
}

/// Read-only view of an execution, published on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub id: ExecutionId,
    pub status: ExecutionStatus,
    pub attempt: u32,
    pub chain: ChainClass,
    /// Friendly message of the last classified failure. Hidden once the item
    /// is `Finalized` or `Cancelled`.
    pub error_message: Option<String>,
    /// Raw detail of the last classified failure.
    pub error_details: Option<String>,
    pub simulation: Option<SimulationProgress>,
    pub result: Option<ExecutionResult>,
    /// Set only for `Cancelled`.
    pub cancelled: bool,
    pub metadata: Map<String, Value>,
}
