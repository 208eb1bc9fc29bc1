//! Ports to the chain-side collaborators of the execution engine.
//!
//! # Architecture
//!
//! The engine never talks to a node directly. Everything it needs from the
//! outside world goes through the traits in this crate:
//!
//! - [`ChainConnection`] - runtime metadata, forking, fee estimation, submission
//! - [`ForkHandle`] - an ephemeral fork of chain state used for dry runs
//! - [`TxSubscription`] - a live submit-and-watch subscription
//! - [`Signer`] - the wallet's signing prompt
//! - [`CallBuilder`] - turns a [`TransferIntent`] into a concrete call
//!
//! All I/O methods return boxed futures ([`ChainFut`]) so the traits stay
//! object-safe and connections can be shared as `Arc<dyn ChainConnection>`
//! through the [`ConnectionPool`].
//!
//! # Resource discipline
//!
//! [`ForkHandle::release`] and [`TxSubscription::unsubscribe`] consume the
//! boxed handle, so a fork or a subscription can be torn down at most once.
//! Callers own the obligation to tear them down at least once.

pub mod backoff;
mod connection;
mod dispatch;
mod pool;
mod signer;

use std::future::Future;
use std::pin::Pin;

use dotexec_types::ChainClass;
use thiserror::Error;

pub use backoff::{BackoffConfig, backoff_delay};
pub use connection::{
    AccountData, ChainConnection, ChainProperties, ForkHandle, RuntimeSurface, TxStatus,
    TxSubscription,
};
pub use dispatch::{ChainEvent, DispatchOutcome};
pub use pool::ConnectionPool;
pub use signer::{
    BuildError, CallBuilder, CallRequest, PreparedCall, SignFut, SignedPayload, Signer,
    SignerRejection,
};

pub use dotexec_types;
pub(crate) use dotexec_types::TransferIntent;

/// Future returned by every chain port.
pub type ChainFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChainError>> + Send + 'a>>;

/// Transport- and node-level failures.
///
/// The `Display` text is what the error classifier sees, so each variant
/// leads with wording the classifier recognises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("connection not ready: {chain}")]
    NotReady { chain: String },
    #[error("no connection available for {0}")]
    Unavailable(ChainClass),
    #[error("connection closed: {0}")]
    Disconnected(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Rejected by the node or its transaction pool; carries the node's text verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("fork error: {0}")]
    Fork(String),
}
