//! Network endpoints and token presentation.

use std::collections::BTreeMap;

use dotexec_types::{ChainClass, NativeToken};
use serde::Deserialize;

/// Endpoints and token metadata for one network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    pub relay_rpc: String,
    #[serde(default)]
    pub asset_hub_rpc: Option<String>,
    pub ss58_format: u16,
    pub decimals: u8,
    pub symbol: String,
}

impl NetworkConfig {
    /// RPC endpoint for a chain class. Other parachains are not configured per network.
    #[must_use]
    pub fn rpc_for(&self, class: ChainClass) -> Option<&str> {
        match class {
            ChainClass::Relay => Some(&self.relay_rpc),
            ChainClass::AssetHub => self.asset_hub_rpc.as_deref(),
            ChainClass::Parachain => None,
        }
    }

    #[must_use]
    pub fn native_token(&self) -> NativeToken {
        NativeToken {
            symbol: self.symbol.clone(),
            decimals: self.decimals,
        }
    }
}

fn preset(relay: &str, asset_hub: &str, ss58_format: u16, decimals: u8, symbol: &str) -> NetworkConfig {
    NetworkConfig {
        relay_rpc: relay.to_string(),
        asset_hub_rpc: Some(asset_hub.to_string()),
        ss58_format,
        decimals,
        symbol: symbol.to_string(),
    }
}

/// Built-in networks used when the config file names none.
#[must_use]
pub fn preset_networks() -> BTreeMap<String, NetworkConfig> {
    BTreeMap::from([
        (
            "polkadot".to_string(),
            preset(
                "wss://rpc.polkadot.io",
                "wss://polkadot-asset-hub-rpc.polkadot.io",
                0,
                10,
                "DOT",
            ),
        ),
        (
            "kusama".to_string(),
            preset(
                "wss://kusama-rpc.polkadot.io",
                "wss://kusama-asset-hub-rpc.polkadot.io",
                2,
                12,
                "KSM",
            ),
        ),
        (
            "westend".to_string(),
            preset(
                "wss://westend-rpc.polkadot.io",
                "wss://westend-asset-hub-rpc.polkadot.io",
                42,
                12,
                "WND",
            ),
        ),
    ])
}
