use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use dotexec_types::{AccountId, BlockHash, ChainClass, GenesisHash, RuntimeVersion, TxHash};

use crate::dispatch::DispatchOutcome;
use crate::signer::{PreparedCall, SignedPayload};
use crate::ChainFut;

/// Chain properties as advertised by the node (`system_properties`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub token_symbol: Option<String>,
    pub token_decimals: Option<u8>,
    pub ss58_format: Option<u16>,
}

/// The call surface and constants a runtime exposes.
///
/// This is the raw material for capability probing: which pallets and calls
/// exist, and which constants are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSurface {
    pub chain_name: String,
    pub runtime: Option<RuntimeVersion>,
    /// Pallet name -> call names.
    pub pallets: BTreeMap<String, BTreeSet<String>>,
    /// `Pallet.Constant` -> value.
    pub constants: BTreeMap<String, u128>,
    pub properties: ChainProperties,
}

impl RuntimeSurface {
    #[must_use]
    pub fn has_pallet(&self, pallet: &str) -> bool {
        self.pallets.contains_key(pallet)
    }

    #[must_use]
    pub fn has_call(&self, pallet: &str, call: &str) -> bool {
        self.pallets
            .get(pallet)
            .is_some_and(|calls| calls.contains(call))
    }

    #[must_use]
    pub fn constant(&self, pallet: &str, name: &str) -> Option<u128> {
        self.constants.get(&format!("{pallet}.{name}")).copied()
    }
}

/// Balance breakdown of one account (`System.Account` data).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub free: u128,
    pub reserved: u128,
    pub frozen: u128,
}

impl AccountData {
    #[must_use]
    pub const fn total(self) -> u128 {
        self.free.saturating_add(self.reserved)
    }
}

/// Status updates from a submit-and-watch subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Ready,
    Broadcast,
    InBlock {
        block_hash: BlockHash,
        outcome: DispatchOutcome,
    },
    Finalized {
        block_hash: BlockHash,
    },
    Dropped {
        reason: String,
    },
    Invalid {
        reason: String,
    },
    Usurped {
        by: TxHash,
    },
}

/// A live connection to one chain.
///
/// Connections are shared read-mostly across executions; implementations must
/// not hold exclusive locks across the futures they return.
pub trait ChainConnection: Send + Sync {
    fn chain_class(&self) -> ChainClass;
    fn genesis_hash(&self) -> &GenesisHash;
    fn is_ready(&self) -> bool;
    fn runtime_version(&self) -> ChainFut<'_, RuntimeVersion>;
    fn runtime_surface(&self) -> ChainFut<'_, RuntimeSurface>;
    /// Open an ephemeral fork of state pinned at the current best block.
    fn fork_at_best(&self) -> ChainFut<'_, Box<dyn ForkHandle>>;
    /// Payment-info query for a prepared call.
    fn estimate_fee<'a>(
        &'a self,
        call: &'a PreparedCall,
        sender: &'a AccountId,
    ) -> ChainFut<'a, u128>;
    fn submit_and_watch(&self, signed: SignedPayload) -> ChainFut<'_, Box<dyn TxSubscription>>;
}

/// An ephemeral fork of chain state. Nothing done here reaches the chain.
pub trait ForkHandle: Send {
    fn block_hash(&self) -> &BlockHash;
    fn account<'a>(&'a self, who: &'a AccountId) -> ChainFut<'a, AccountData>;
    /// Execute `call` as if signed by `sender`, applying its effects to the fork.
    fn dry_run<'a>(
        &'a mut self,
        call: &'a PreparedCall,
        sender: &'a AccountId,
    ) -> ChainFut<'a, DispatchOutcome>;
    /// Tear the fork down, releasing its block and storage.
    fn release(self: Box<Self>) -> ChainFut<'static, ()>;
}

/// A live submit-and-watch subscription for one extrinsic.
pub trait TxSubscription: Send {
    fn tx_hash(&self) -> &TxHash;
    /// Next status update; `None` when the node closed the subscription.
    fn next_status(&mut self) -> ChainFut<'_, Option<TxStatus>>;
    fn unsubscribe(self: Box<Self>) -> ChainFut<'static, ()>;
}

impl fmt::Debug for dyn ChainConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConnection")
            .field("class", &self.chain_class())
            .field("genesis", self.genesis_hash())
            .field("ready", &self.is_ready())
            .finish()
    }
}
