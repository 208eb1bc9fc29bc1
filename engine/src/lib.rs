//! Execution engine for dotexec - capability probing, simulation, and the
//! per-transfer state machine.
//!
//! This crate has no UI dependencies. Callers register chain connections in a
//! [`ConnectionPool`], build an [`EngineContext`], and submit transfers to an
//! [`ExecutionSession`]; progress comes back as snapshots and
//! [`ExecutionEvent`]s.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod cancel;
mod context;
mod item;
mod machine;
mod observer;
mod probe;
mod session;
mod simulator;
mod transitions;

#[cfg(test)]
mod test_support;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use context::{EngineContext, ExecutionTimeouts};
pub use item::ExecutionItem;
pub use machine::ExecutionMachine;
pub use observer::{ExecutionEvent, ObserverRegistry};
pub use probe::{
    CapabilityCache, CapabilityProbe, ProbeError, probe, select_transfer_variant, supports_asset,
    validate_minimum,
};
pub use session::{ExecutionSession, StatusSummary};
pub use simulator::Simulator;
pub use transitions::{
    ExecutionEdge, TransitionError, TransitionReceipt, is_legal_transition, transition_edge,
    transition_receipt,
};

// Re-export from crates for public API
pub use dotexec_chain::{
    self, BackoffConfig, CallBuilder, ChainConnection, ChainError, ConnectionPool, Signer,
};
pub use dotexec_config::{ConfigError, EngineConfig};
pub use dotexec_core::{ErrorClassifier, RetryPlanner};
pub use dotexec_types::{
    ChainCapabilities, ChainClass, ErrorAnalysis, ErrorCategory, ExecutionId, ExecutionSnapshot,
    ExecutionStatus, MAX_ATTEMPTS, RetryStrategy, SimulationResult, TransferIntent,
};
