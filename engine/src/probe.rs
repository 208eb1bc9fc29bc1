//! Capability probing and the per-runtime capability cache.
//!
//! A probe reads the runtime's call surface and constants once and condenses
//! them into an immutable [`ChainCapabilities`]. Capabilities are cached by
//! (genesis hash, spec version): a cache hit costs one `runtime_version` call,
//! and a runtime upgrade naturally misses and re-probes.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use dotexec_chain::{ChainConnection, ChainError, RuntimeSurface};
use dotexec_types::{
    AssetRef, AssetSupport, BatchSupport, ChainCapabilities, ChainClass, GenesisHash, NativeToken,
    RuntimeVersion, TransferVariant,
};
use thiserror::Error;

const BALANCES: &str = "Balances";
const UTILITY: &str = "Utility";

/// Markers checked against the lowercased chain name and spec name.
const ASSET_HUB_MARKERS: &[&str] = &[
    "asset-hub",
    "asset hub",
    "assethub",
    "asset_hub",
    "statemint",
    "statemine",
    "westmint",
];
const RELAY_MARKERS: &[&str] = &["polkadot", "kusama", "westend", "rococo", "paseo"];

const DEFAULT_SYMBOL: &str = "UNIT";
const DEFAULT_DECIMALS: u8 = 12;
const DEFAULT_SS58: u16 = 42;

/// The `Display` text feeds the error classifier, so "not found" wording is
/// deliberate for the capability gaps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("connection not ready: {chain}")]
    NotReady { chain: ChainClass },
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("call not found: no balance transfer method on {chain}")]
    NoTransferMethod { chain: String },
    #[error("call not found: transfer_keep_alive is not available on {chain}")]
    UnsupportedVariant { chain: String },
}

// ============================================================================
// Probing
// ============================================================================

/// Inspect a live connection.
pub async fn probe(connection: &dyn ChainConnection) -> Result<ChainCapabilities, ProbeError> {
    if !connection.is_ready() {
        return Err(ProbeError::NotReady {
            chain: connection.chain_class(),
        });
    }

    let surface = connection.runtime_surface().await?;
    let runtime = match surface.runtime.clone() {
        Some(runtime) => runtime,
        None => connection.runtime_version().await?,
    };

    let capabilities = capabilities_from_surface(connection.genesis_hash().clone(), runtime, &surface);
    tracing::debug!(
        chain = %capabilities.chain_name,
        class = %capabilities.class,
        spec_version = capabilities.runtime.spec_version,
        variants = ?capabilities.transfer_variants,
        "Probed chain capabilities"
    );
    Ok(capabilities)
}

fn capabilities_from_surface(
    genesis_hash: GenesisHash,
    runtime: RuntimeVersion,
    surface: &RuntimeSurface,
) -> ChainCapabilities {
    let transfer_variants: BTreeSet<_> = [
        TransferVariant::Legacy,
        TransferVariant::AllowDeath,
        TransferVariant::KeepAlive,
    ]
    .into_iter()
    .filter(|variant| surface.has_call(BALANCES, variant.call_name()))
    .collect();

    let batching = BatchSupport {
        batch: surface.has_call(UTILITY, "batch"),
        batch_all: surface.has_call(UTILITY, "batch_all"),
        force_batch: surface.has_call(UTILITY, "force_batch"),
    };
    let assets = AssetSupport {
        assets: surface.has_pallet("Assets"),
        foreign_assets: surface.has_pallet("ForeignAssets"),
        pool_assets: surface.has_pallet("PoolAssets"),
    };
    let properties = &surface.properties;

    ChainCapabilities {
        class: classify_chain(surface, &runtime),
        chain_name: surface.chain_name.clone(),
        genesis_hash,
        runtime,
        transfer_variants,
        assets,
        batching,
        existential_deposit: surface.constant(BALANCES, "ExistentialDeposit").unwrap_or(0),
        native_token: NativeToken {
            symbol: properties
                .token_symbol
                .clone()
                .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            decimals: properties.token_decimals.unwrap_or(DEFAULT_DECIMALS),
        },
        ss58_prefix: properties.ss58_format.unwrap_or(DEFAULT_SS58),
    }
}

/// A `Paras` pallet means relay chain. Names are only the last resort.
fn classify_chain(surface: &RuntimeSurface, runtime: &RuntimeVersion) -> ChainClass {
    if surface.has_pallet("Paras") {
        return ChainClass::Relay;
    }
    let names = format!("{} {}", surface.chain_name, runtime.spec_name).to_lowercase();
    if ASSET_HUB_MARKERS.iter().any(|m| names.contains(m)) {
        ChainClass::AssetHub
    } else if RELAY_MARKERS.iter().any(|m| names.contains(m)) {
        ChainClass::Relay
    } else {
        ChainClass::Parachain
    }
}

// ============================================================================
// Variant selection
// ============================================================================

/// Fails when the chain has no usable transfer call at all.
pub fn validate_minimum(capabilities: &ChainCapabilities) -> Result<(), ProbeError> {
    if capabilities.has_any_transfer() {
        Ok(())
    } else {
        Err(ProbeError::NoTransferMethod {
            chain: capabilities.chain_name.clone(),
        })
    }
}

/// Pick the balance-transfer variant for one attempt.
///
/// An explicit keep-alive request is a requirement, never a preference. Without
/// one, the native token on asset hub prefers keep-alive; everything else
/// prefers allow-death, then the legacy call.
pub fn select_transfer_variant(
    capabilities: &ChainCapabilities,
    keep_alive_requested: bool,
    asset: &AssetRef,
) -> Result<TransferVariant, ProbeError> {
    if keep_alive_requested {
        return if capabilities.has_variant(TransferVariant::KeepAlive) {
            Ok(TransferVariant::KeepAlive)
        } else {
            Err(ProbeError::UnsupportedVariant {
                chain: capabilities.chain_name.clone(),
            })
        };
    }

    let native_on_asset_hub = asset.is_native() && capabilities.class == ChainClass::AssetHub;
    if native_on_asset_hub && capabilities.has_variant(TransferVariant::KeepAlive) {
        return Ok(TransferVariant::KeepAlive);
    }

    [
        TransferVariant::AllowDeath,
        TransferVariant::Legacy,
        TransferVariant::KeepAlive,
    ]
    .into_iter()
    .find(|variant| capabilities.has_variant(*variant))
    .ok_or_else(|| ProbeError::NoTransferMethod {
        chain: capabilities.chain_name.clone(),
    })
}

/// Native always; registered assets need the pallet that holds them.
#[must_use]
pub fn supports_asset(capabilities: &ChainCapabilities, asset: &AssetRef) -> bool {
    match asset {
        AssetRef::Native => true,
        AssetRef::Local { .. } => capabilities.assets.assets,
        AssetRef::Foreign { .. } => capabilities.assets.foreign_assets,
    }
}

// ============================================================================
// Cache
// ============================================================================

type CacheKey = (GenesisHash, u32);

/// Read-only capability snapshots shared across executions.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: Mutex<HashMap<CacheKey, Arc<ChainCapabilities>>>,
}

impl CapabilityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, genesis: &GenesisHash, spec_version: u32) -> Option<Arc<ChainCapabilities>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(genesis.clone(), spec_version))
            .cloned()
    }

    /// Store a snapshot, superseding any other runtime version of the same chain.
    pub fn insert(&self, capabilities: Arc<ChainCapabilities>) {
        let genesis = capabilities.genesis_hash.clone();
        let version = capabilities.runtime.spec_version;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(g, v), _| *g != genesis || *v == version);
        entries.insert((genesis, version), capabilities);
    }

    /// Forget every snapshot of one chain. Returns how many were dropped.
    pub fn invalidate(&self, genesis: &GenesisHash) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(g, _), _| g != genesis);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Probe front-end that consults the cache first.
#[derive(Debug, Default)]
pub struct CapabilityProbe {
    cache: CapabilityCache,
}

impl CapabilityProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cache(&self) -> &CapabilityCache {
        &self.cache
    }

    pub async fn capabilities(
        &self,
        connection: &dyn ChainConnection,
    ) -> Result<Arc<ChainCapabilities>, ProbeError> {
        if !connection.is_ready() {
            return Err(ProbeError::NotReady {
                chain: connection.chain_class(),
            });
        }

        let version = connection.runtime_version().await?;
        if let Some(hit) = self
            .cache
            .get(connection.genesis_hash(), version.spec_version)
        {
            return Ok(hit);
        }

        let capabilities = Arc::new(probe(connection).await?);
        self.cache.insert(Arc::clone(&capabilities));
        Ok(capabilities)
    }

    /// Drop cached snapshots after a reconnect.
    pub fn invalidate(&self, genesis: &GenesisHash) {
        let dropped = self.cache.invalidate(genesis);
        tracing::debug!(genesis = %genesis, dropped, "Invalidated capability cache");
    }
}
