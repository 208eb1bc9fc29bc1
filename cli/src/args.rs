//! Command-line definition.

use clap::{Parser, Subcommand};
use dotexec_types::ChainClass;

#[derive(Debug, Parser)]
#[command(name = "dotexec")]
#[command(about = "Diagnostics for the dotexec transfer execution engine")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Classify a raw failure message
    Classify {
        /// The failure text, as reported by the chain or signer
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Classify, then plan the next attempt
    Plan {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
        /// 1-based number of the attempt that failed
        #[arg(long, default_value_t = 1)]
        attempt: u32,
        /// Chain class the failed attempt targeted
        #[arg(long, default_value = "asset-hub", value_parser = parse_chain)]
        chain: ChainClass,
        /// The transfer currently requires the keep-alive variant
        #[arg(long)]
        keep_alive: bool,
    },
    /// List the classification rules in priority order
    Rules,
    /// List configured networks (presets when none)
    Networks,
    /// Convert a decimal amount to planck
    Amount {
        value: String,
        #[arg(long, default_value = "polkadot")]
        network: String,
    },
}

fn parse_chain(value: &str) -> Result<ChainClass, String> {
    ChainClass::parse(value).ok_or_else(|| format!("unknown chain class {value:?}"))
}

/// Words of a message argument joined back into one string.
pub fn join_message(words: &[String]) -> String {
    words.join(" ")
}
