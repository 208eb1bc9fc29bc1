//! Chain classification and capability descriptors.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::GenesisHash;

/// Class of chain in the target network.
///
/// Transfer-method availability differs between classes, so the class is the
/// unit a retry switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainClass {
    AssetHub,
    Relay,
    Parachain,
}

impl ChainClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssetHub => "asset-hub",
            Self::Relay => "relay",
            Self::Parachain => "parachain",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::AssetHub => "Asset Hub",
            Self::Relay => "Relay Chain",
            Self::Parachain => "Parachain",
        }
    }

    /// The class a chain-switch retry moves to.
    ///
    /// Asset hub and relay swap with each other; any other parachain falls
    /// back to the relay chain.
    #[must_use]
    pub const fn alternate(self) -> Self {
        match self {
            Self::AssetHub | Self::Parachain => Self::Relay,
            Self::Relay => Self::AssetHub,
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asset-hub" | "assethub" | "asset_hub" | "ah" => Some(Self::AssetHub),
            "relay" | "relay-chain" | "relaychain" => Some(Self::Relay),
            "parachain" | "para" | "other" => Some(Self::Parachain),
            _ => None,
        }
    }

    #[must_use]
    pub fn all() -> &'static [ChainClass] {
        &[Self::AssetHub, Self::Relay, Self::Parachain]
    }
}

impl fmt::Display for ChainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Balance-transfer call variants exposed by the balances pallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferVariant {
    /// `transfer` - removed from recent runtimes.
    Legacy,
    /// `transfer_allow_death` - may reap the sender.
    AllowDeath,
    /// `transfer_keep_alive` - refuses to take the sender below the existential deposit.
    KeepAlive,
}

impl TransferVariant {
    /// Name of the call in the balances pallet.
    #[must_use]
    pub const fn call_name(self) -> &'static str {
        match self {
            Self::Legacy => "transfer",
            Self::AllowDeath => "transfer_allow_death",
            Self::KeepAlive => "transfer_keep_alive",
        }
    }

    #[must_use]
    pub fn from_call_name(name: &str) -> Option<Self> {
        match name {
            "transfer" => Some(Self::Legacy),
            "transfer_allow_death" => Some(Self::AllowDeath),
            "transfer_keep_alive" => Some(Self::KeepAlive),
            _ => None,
        }
    }
}

impl fmt::Display for TransferVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.call_name())
    }
}

/// Asset a transfer moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetRef {
    /// The chain's native token.
    Native,
    /// An asset registered in the `Assets` pallet.
    Local { id: u32 },
    /// An asset registered in the `ForeignAssets` pallet, addressed by location.
    Foreign { location: String },
}

impl AssetRef {
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }
}

/// Runtime version as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersion {
    pub spec_name: String,
    pub spec_version: u32,
}

/// Which multi-asset pallets are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSupport {
    pub assets: bool,
    pub foreign_assets: bool,
    pub pool_assets: bool,
}

/// Which batching calls are present in the utility pallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSupport {
    pub batch: bool,
    pub batch_all: bool,
    pub force_batch: bool,
}

impl BatchSupport {
    #[must_use]
    pub const fn any(self) -> bool {
        self.batch || self.batch_all || self.force_batch
    }
}

/// Native token presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeToken {
    pub symbol: String,
    pub decimals: u8,
}

/// Immutable snapshot of what a connected chain can do.
///
/// Produced once per (genesis, runtime version) and shared read-only across
/// every execution that targets the chain. A runtime upgrade or reconnect
/// supersedes it with a fresh probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCapabilities {
    pub chain_name: String,
    pub genesis_hash: GenesisHash,
    pub runtime: RuntimeVersion,
    pub class: ChainClass,
    pub transfer_variants: BTreeSet<TransferVariant>,
    pub assets: AssetSupport,
    pub batching: BatchSupport,
    pub existential_deposit: u128,
    pub native_token: NativeToken,
    pub ss58_prefix: u16,
}

impl ChainCapabilities {
    #[must_use]
    pub fn has_variant(&self, variant: TransferVariant) -> bool {
        self.transfer_variants.contains(&variant)
    }

    #[must_use]
    pub fn has_any_transfer(&self) -> bool {
        !self.transfer_variants.is_empty()
    }
}
