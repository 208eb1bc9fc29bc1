//! Shared collaborators and timing policy for every execution in a session.

use std::sync::Arc;
use std::time::Duration;

use dotexec_chain::{BackoffConfig, CallBuilder, ConnectionPool, Signer};
use dotexec_config::EngineConfig;
use dotexec_core::{ErrorClassifier, RetryPlanner};

use crate::probe::CapabilityProbe;
use crate::simulator::Simulator;

/// Bounds on the confirmation waits after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeouts {
    pub inclusion: Duration,
    pub finality: Duration,
}

impl Default for ExecutionTimeouts {
    fn default() -> Self {
        Self {
            inclusion: Duration::from_secs(60),
            finality: Duration::from_secs(120),
        }
    }
}

/// Collaborators and policy shared by every execution in a session.
///
/// Everything here is read-only or internally synchronised; machines share it
/// through an `Arc`.
pub struct EngineContext {
    pub pool: Arc<ConnectionPool>,
    pub probe: CapabilityProbe,
    pub simulator: Simulator,
    pub classifier: ErrorClassifier,
    pub planner: RetryPlanner,
    pub signer: Arc<dyn Signer>,
    pub builder: Arc<dyn CallBuilder>,
    pub timeouts: ExecutionTimeouts,
    pub backoff: BackoffConfig,
}

impl EngineContext {
    #[must_use]
    pub fn new(
        pool: Arc<ConnectionPool>,
        signer: Arc<dyn Signer>,
        builder: Arc<dyn CallBuilder>,
    ) -> Self {
        Self {
            pool,
            probe: CapabilityProbe::new(),
            simulator: Simulator::default(),
            classifier: ErrorClassifier,
            planner: RetryPlanner::new(),
            signer,
            builder,
            timeouts: ExecutionTimeouts::default(),
            backoff: BackoffConfig::default(),
        }
    }

    /// Apply the `[execution]` and `[backoff]` sections.
    #[must_use]
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        let execution = &config.execution;
        self.simulator = Simulator::new(execution.fee_estimate_timeout());
        self.timeouts = ExecutionTimeouts {
            inclusion: execution.inclusion_timeout(),
            finality: execution.finality_timeout(),
        };
        self.backoff = BackoffConfig {
            initial_delay: Duration::from_millis(config.backoff.initial_delay_ms),
            max_delay: Duration::from_millis(config.backoff.max_delay_ms),
            jitter_factor: config.backoff.jitter_factor,
        };
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ExecutionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
