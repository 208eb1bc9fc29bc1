//! dotexec CLI - diagnostics for the transfer execution engine.
//!
//! Every command prints JSON on stdout. Logs go to stderr, filtered by
//! `RUST_LOG`, else the `[logging] filter` from the config file, else `info`.
//!
//! ```text
//! dotexec classify "wasm unreachable"
//! dotexec plan "Timeout waiting for response" --attempt 2 --chain relay
//! ```

mod args;

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value, json};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dotexec_config::{EngineConfig, config_path};
use dotexec_core::{CLASSIFICATION_RULES, ErrorClassifier, RetryPlanner, UNKNOWN_RULE};
use dotexec_types::MAX_ATTEMPTS;
use dotexec_types::units::{format_balance, to_planck};

use args::{Cli, Command, join_message};

fn init_tracing(config_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = EngineConfig::load();
    init_tracing(
        loaded
            .as_ref()
            .ok()
            .and_then(Option::as_ref)
            .map(|config| config.logging.filter.as_str()),
    );
    let config = match loaded {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(path = %err.path().display(), error = %err, "Ignoring config file");
            EngineConfig::default()
        }
    };

    tracing::debug!(command = ?cli.command, "Running command");
    let output = run(&cli.command, &config)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(command: &Command, config: &EngineConfig) -> Result<Value> {
    let classifier = ErrorClassifier;
    match command {
        Command::Classify { message } => Ok(serde_json::to_value(
            classifier.classify(&join_message(message)),
        )?),
        Command::Plan {
            message,
            attempt,
            chain,
            keep_alive,
        } => {
            let analysis = classifier.classify(&join_message(message));
            let strategy = RetryPlanner::new().plan(&analysis, *attempt, *chain, *keep_alive);
            Ok(json!({
                "analysis": analysis,
                "attempt": attempt,
                "chain": chain,
                "retry": strategy.is_some(),
                "strategy": strategy,
            }))
        }
        Command::Rules => Ok(Value::Array(
            classifier
                .rules()
                .iter()
                .chain([&UNKNOWN_RULE])
                .enumerate()
                .map(|(priority, rule)| {
                    json!({
                        "priority": priority + 1,
                        "name": rule.name,
                        "category": rule.category,
                        "should_retry": rule.should_retry,
                        "user_message": rule.user_message.as_str(),
                        "suggested_fix": rule.suggested_fix,
                        "patterns": rule.patterns,
                    })
                })
                .collect(),
        )),
        Command::Networks => {
            let networks: Map<String, Value> = config
                .networks()
                .into_iter()
                .map(|(name, network)| {
                    let entry = json!({
                        "relay_rpc": network.relay_rpc,
                        "asset_hub_rpc": network.asset_hub_rpc,
                        "ss58_format": network.ss58_format,
                        "decimals": network.decimals,
                        "symbol": network.symbol,
                    });
                    (name, entry)
                })
                .collect();
            Ok(json!({
                "config_path": config_path().map(|p| p.display().to_string()),
                "networks": networks,
                "max_attempts": MAX_ATTEMPTS,
                "rules": CLASSIFICATION_RULES.len() + 1,
            }))
        }
        Command::Amount { value, network } => {
            let preset = config
                .network(network)
                .with_context(|| format!("unknown network {network:?}"))?;
            let planck = to_planck(value, preset.decimals)?;
            Ok(json!({
                "network": network,
                "planck": planck.to_string(),
                "display": format_balance(planck, preset.decimals, &preset.symbol),
            }))
        }
    }
}
