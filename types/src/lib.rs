//! Core domain types for dotexec.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod analysis;
mod chain;
mod execution;
mod ids;
mod simulation;
pub mod units;

pub use analysis::{ErrorAnalysis, ErrorCategory, RetryDirective, RetryStrategy};
pub use chain::{
    AssetRef, AssetSupport, BatchSupport, ChainCapabilities, ChainClass, NativeToken,
    RuntimeVersion, TransferVariant,
};
pub use execution::{ExecutionResult, ExecutionSnapshot, ExecutionStatus, TransferIntent};
pub use ids::{AccountId, BlockHash, ExecutionId, GenesisHash, TxHash};
pub use simulation::{
    BalanceDelta, DeltaDirection, SimulationPhase, SimulationProgress, SimulationResult,
};

/// Upper bound on total attempts for one execution, first attempt included.
pub const MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A compile-time checked non-empty static string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NonEmptyStaticStr(&'static str);

impl NonEmptyStaticStr {
    #[must_use]
    pub const fn new(value: &'static str) -> Self {
        assert!(!value.is_empty(), "NonEmptyStaticStr must not be empty");
        Self(value)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl AsRef<str> for NonEmptyStaticStr {
    fn as_ref(&self) -> &str {
        self.0
    }
}
