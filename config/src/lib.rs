//! Configuration loading for dotexec.
//!
//! The config file is TOML, read from `$DOTEXEC_CONFIG` or
//! `~/.dotexec/config.toml`. A missing file is not an error; every section
//! has defaults.
//!
//! ```toml
//! [execution]
//! inclusion_timeout_secs = 60
//! finality_timeout_secs = 120
//! fee_estimate_timeout_ms = 5000
//!
//! [backoff]
//! initial_delay_ms = 500
//! max_delay_ms = 8000
//! jitter_factor = 0.25
//!
//! [logging]
//! filter = "info,dotexec_engine=debug"
//!
//! [networks.local]
//! relay_rpc = "ws://127.0.0.1:9944"
//! asset_hub_rpc = "${ASSET_HUB_RPC}"
//! ss58_format = 42
//! decimals = 12
//! symbol = "UNIT"
//! ```

mod networks;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io, mem};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub use networks::{NetworkConfig, preset_networks};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "DOTEXEC_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub backoff: BackoffSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Bound on waiting for block inclusion after submission.
    pub inclusion_timeout_secs: u64,
    /// Bound on waiting for finality after inclusion.
    pub finality_timeout_secs: u64,
    /// Bound on the best-effort fee estimate during simulation.
    pub fee_estimate_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            inclusion_timeout_secs: 60,
            finality_timeout_secs: 120,
            fee_estimate_timeout_ms: 5000,
        }
    }
}

impl ExecutionConfig {
    #[must_use]
    pub const fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_secs)
    }

    #[must_use]
    pub const fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_secs)
    }

    #[must_use]
    pub const fn fee_estimate_timeout(&self) -> Duration {
        Duration::from_millis(self.fee_estimate_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffSection {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Down-jitter factor in `[0, 1]`.
    pub jitter_factor: f64,
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 8000,
            jitter_factor: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the default location. `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&content).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to parse config");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Parse TOML text, lowercase network names, and expand `${VAR}` references
    /// in network endpoints.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        config.networks = mem::take(&mut config.networks)
            .into_iter()
            .map(|(name, mut network)| {
                network.relay_rpc = expand_env_vars(&network.relay_rpc);
                network.asset_hub_rpc = network.asset_hub_rpc.as_deref().map(expand_env_vars);
                (name.to_ascii_lowercase(), network)
            })
            .collect();
        Ok(config)
    }

    /// Configured networks, or the built-in presets when none are configured.
    #[must_use]
    pub fn networks(&self) -> BTreeMap<String, NetworkConfig> {
        if self.networks.is_empty() {
            preset_networks()
        } else {
            self.networks.clone()
        }
    }

    #[must_use]
    pub fn network(&self, name: &str) -> Option<NetworkConfig> {
        self.networks().remove(&name.to_ascii_lowercase())
    }
}

/// `$DOTEXEC_CONFIG` if set, else `~/.dotexec/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".dotexec").join("config.toml"))
}

/// Replace `${VAR}` with the variable's value (empty when unset).
///
/// An unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
