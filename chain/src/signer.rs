//! Signing prompt and call construction ports.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use dotexec_types::{AccountId, ChainCapabilities, ChainClass, TransferVariant};

use crate::TransferIntent;

/// A concrete call ready to be simulated, signed, and submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedCall {
    pub chain: ChainClass,
    pub pallet: String,
    pub call: String,
    pub args: Value,
    /// Balance-transfer variant, when the call is a native transfer.
    pub variant: Option<TransferVariant>,
    /// SCALE-encoded call data.
    pub encoded: Vec<u8>,
}

impl PreparedCall {
    /// `pallet.call`, as shown in logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}.{}", self.pallet, self.call)
    }
}

/// A call the signer approved, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub call: PreparedCall,
    pub signer: AccountId,
    pub extrinsic: Vec<u8>,
}

/// The user declined to sign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signer rejected: {reason}")]
pub struct SignerRejection {
    pub reason: String,
}

impl SignerRejection {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type SignFut<'a> = Pin<Box<dyn Future<Output = Result<SignedPayload, SignerRejection>> + Send + 'a>>;

/// The wallet's signing prompt.
///
/// Each attempt asks exactly once; a rejection ends the execution.
pub trait Signer: Send + Sync {
    fn sign<'a>(&'a self, call: &'a PreparedCall, signer: &'a AccountId) -> SignFut<'a>;
}

/// Everything a builder needs to produce one attempt's call.
#[derive(Debug, Clone, Copy)]
pub struct CallRequest<'a> {
    pub capabilities: &'a ChainCapabilities,
    pub intent: &'a TransferIntent,
    pub variant: TransferVariant,
    /// Per-attempt parameter overrides carried by a retry.
    pub overrides: &'a Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("{0}")]
    Unsupported(String),
}

/// Turns a transfer intent into a concrete call for the targeted chain.
pub trait CallBuilder: Send + Sync {
    fn build(&self, request: CallRequest<'_>) -> Result<PreparedCall, BuildError>;
}
