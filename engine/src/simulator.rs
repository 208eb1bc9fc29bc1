//! Pre-submission dry runs against forked chain state.
//!
//! The simulator never fails: every internal problem becomes a failed
//! [`SimulationResult`]. The fork it opens is released exactly once, on every
//! exit path. If the simulation future is dropped mid-flight (cancellation),
//! the guard hands the release to the runtime.

use std::time::Duration;

use dotexec_chain::{ChainConnection, ChainError, DispatchOutcome, ForkHandle, PreparedCall};
use dotexec_types::{
    AccountId, BalanceDelta, BlockHash, SimulationPhase, SimulationProgress, SimulationResult,
};
use tokio::runtime::Handle;

const DEFAULT_FEE_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns a fork until it is released.
struct ForkGuard {
    fork: Option<Box<dyn ForkHandle>>,
}

impl ForkGuard {
    fn new(fork: Box<dyn ForkHandle>) -> Self {
        Self { fork: Some(fork) }
    }

    fn get(&mut self) -> Result<&mut dyn ForkHandle, ChainError> {
        match self.fork.as_deref_mut() {
            Some(fork) => Ok(fork),
            None => Err(ChainError::Fork("fork already released".to_string())),
        }
    }

    async fn release(mut self) {
        if let Some(fork) = self.fork.take()
            && let Err(err) = fork.release().await
        {
            tracing::warn!(error = %err, "Failed to release simulation fork");
        }
    }
}

impl Drop for ForkGuard {
    fn drop(&mut self) {
        let Some(fork) = self.fork.take() else {
            return;
        };
        let release = fork.release();
        match Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Releasing simulation fork after interrupted simulation");
                handle.spawn(async move {
                    if let Err(err) = release.await {
                        tracing::warn!(error = %err, "Failed to release simulation fork");
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime to release simulation fork on"),
        }
    }
}

struct DryRun {
    block_hash: BlockHash,
    outcome: DispatchOutcome,
    before: u128,
    after: u128,
}

#[derive(Debug, Clone)]
pub struct Simulator {
    fee_timeout: Duration,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_TIMEOUT)
    }
}

impl Simulator {
    #[must_use]
    pub const fn new(fee_timeout: Duration) -> Self {
        Self { fee_timeout }
    }

    #[must_use]
    pub const fn fee_timeout(&self) -> Duration {
        self.fee_timeout
    }

    pub async fn simulate(
        &self,
        connection: &dyn ChainConnection,
        call: &PreparedCall,
        sender: &AccountId,
    ) -> SimulationResult {
        self.simulate_reporting(connection, call, sender, &mut |_| {})
            .await
    }

    /// [`Simulator::simulate`], reporting each phase as it starts.
    pub async fn simulate_reporting(
        &self,
        connection: &dyn ChainConnection,
        call: &PreparedCall,
        sender: &AccountId,
        on_progress: &mut (dyn FnMut(SimulationProgress) + Send),
    ) -> SimulationResult {
        on_progress(SimulationProgress::new(
            SimulationPhase::Initializing,
            format!("Preparing {}", call.label()),
        ));
        on_progress(SimulationProgress::new(
            SimulationPhase::Forking,
            "Forking chain state at the best block",
        ));

        let dry_run = match connection.fork_at_best().await {
            Ok(fork) => {
                let mut guard = ForkGuard::new(fork);
                let dry_run = execute(&mut guard, call, sender, on_progress).await;
                guard.release().await;
                dry_run
            }
            Err(err) => Err(err),
        };

        let dry_run = match dry_run {
            Ok(dry_run) => dry_run,
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(call = %call.label(), error = %reason, "Simulation failed internally");
                on_progress(SimulationProgress::new(SimulationPhase::Error, reason.clone()));
                return SimulationResult::failed(reason);
            }
        };

        on_progress(SimulationProgress::new(
            SimulationPhase::Analyzing,
            "Analyzing dispatch outcome",
        ));

        if let Some(reason) = dry_run.outcome.failure_reason() {
            tracing::debug!(call = %call.label(), reason = %reason, "Simulated call failed");
            on_progress(SimulationProgress::new(SimulationPhase::Error, reason.clone()));
            return SimulationResult {
                block_hash: Some(dry_run.block_hash),
                ..SimulationResult::failed(reason)
            };
        }

        let estimated_fee = self.estimate_fee(connection, call, sender).await;
        let balance_deltas = if dry_run.outcome.events().is_empty() {
            Vec::new()
        } else {
            BalanceDelta::from_net_change(sender.clone(), dry_run.before, dry_run.after)
                .into_iter()
                .collect()
        };

        on_progress(SimulationProgress::new(
            SimulationPhase::Complete,
            format!("Simulation succeeded; estimated fee {estimated_fee} planck"),
        ));
        SimulationResult {
            success: true,
            failure_reason: None,
            estimated_fee,
            balance_deltas,
            block_hash: Some(dry_run.block_hash),
        }
    }

    /// Best effort: any failure degrades to a zero fee.
    async fn estimate_fee(
        &self,
        connection: &dyn ChainConnection,
        call: &PreparedCall,
        sender: &AccountId,
    ) -> u128 {
        match tokio::time::timeout(self.fee_timeout, connection.estimate_fee(call, sender)).await {
            Ok(Ok(fee)) => fee,
            Ok(Err(err)) => {
                tracing::warn!(call = %call.label(), error = %err, "Fee estimation failed");
                0
            }
            Err(_) => {
                tracing::warn!(
                    call = %call.label(),
                    timeout_ms = self.fee_timeout.as_millis(),
                    "Fee estimation timed out"
                );
                0
            }
        }
    }
}

async fn execute(
    guard: &mut ForkGuard,
    call: &PreparedCall,
    sender: &AccountId,
    on_progress: &mut (dyn FnMut(SimulationProgress) + Send),
) -> Result<DryRun, ChainError> {
    let fork = guard.get()?;
    let block_hash = fork.block_hash().clone();
    let before = fork.account(sender).await?.total();

    on_progress(SimulationProgress::new(
        SimulationPhase::Executing,
        format!("Executing {} at {block_hash}", call.label()),
    ));
    let outcome = fork.dry_run(call, sender).await?;
    let after = fork.account(sender).await?.total();

    Ok(DryRun {
        block_hash,
        outcome,
        before,
        after,
    })
}
