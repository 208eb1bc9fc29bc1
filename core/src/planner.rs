//! Turns one classified failure into at most one correction for the next attempt.

use dotexec_types::{ChainClass, ErrorAnalysis, ErrorCategory, MAX_ATTEMPTS, RetryStrategy};
use tracing::debug;

use crate::classifier::{
    ALTERNATE_CHAIN_HINT, CALL_NOT_FOUND_PATTERNS, NO_PROVIDERS_PATTERNS, TRAP_PATTERNS,
    UNKNOWN_ASSET_PATTERNS, matches_any,
};

/// Stateless retry planner.
///
/// | Category | Plan |
/// |----------|------|
/// | `USER_ERROR` | stop |
/// | any, `attempt >= MAX_ATTEMPTS` | stop |
/// | `CONFIGURATION_ERROR` | switch chain when the failure points at the wrong chain, else retry unchanged |
/// | `NETWORK_ERROR` | retry unchanged |
/// | `UNKNOWN_ERROR` | switch chain on attempt 1, else stop |
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPlanner;

impl RetryPlanner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    ///
    /// Returns `None` to stop. A returned strategy carries at most one directive.
    #[must_use]
    pub fn plan(
        &self,
        analysis: &ErrorAnalysis,
        attempt: u32,
        current_chain: ChainClass,
        current_keep_alive: bool,
    ) -> Option<RetryStrategy> {
        let strategy = decide(analysis, attempt, current_chain);
        debug!(
            attempt,
            chain = %current_chain,
            keep_alive = current_keep_alive,
            category = %analysis.category,
            retry = strategy.is_some(),
            switch = strategy.as_ref().is_some_and(RetryStrategy::switches_chain),
            "Planned retry"
        );
        strategy
    }
}

fn decide(
    analysis: &ErrorAnalysis,
    attempt: u32,
    current_chain: ChainClass,
) -> Option<RetryStrategy> {
    if analysis.category == ErrorCategory::UserError || attempt >= MAX_ATTEMPTS {
        return None;
    }

    match analysis.category {
        ErrorCategory::UserError => None,
        ErrorCategory::ConfigurationError => Some(match wrong_chain_reason(analysis, current_chain) {
            Some(reason) => RetryStrategy::switch_chain(current_chain.alternate(), reason),
            None => RetryStrategy::unchanged("configuration error without a chain hint"),
        }),
        ErrorCategory::NetworkError => Some(RetryStrategy::unchanged("transient network fault")),
        ErrorCategory::UnknownError => (attempt == 1).then(|| {
            RetryStrategy::switch_chain(current_chain.alternate(), "unrecognised failure")
        }),
    }
}

/// Why a configuration error indicates the wrong chain, if it does.
fn wrong_chain_reason(analysis: &ErrorAnalysis, current_chain: ChainClass) -> Option<&'static str> {
    let details = analysis.technical_details.to_lowercase();

    if matches_any(&details, TRAP_PATTERNS) {
        return Some("runtime trap or validity rejection; possibly wrong chain");
    }
    if current_chain == ChainClass::AssetHub && matches_any(&details, NO_PROVIDERS_PATTERNS) {
        return Some("account has no providers on asset hub");
    }
    if matches_any(&details, UNKNOWN_ASSET_PATTERNS) {
        return Some("asset unknown on this chain");
    }
    if matches_any(&details, CALL_NOT_FOUND_PATTERNS) {
        return Some("call not available on this chain");
    }
    if analysis
        .suggested_fix
        .as_deref()
        .is_some_and(|fix| fix.to_lowercase().contains(ALTERNATE_CHAIN_HINT))
    {
        return Some("suggested fix points at the alternate chain");
    }
    None
}
