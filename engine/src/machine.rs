//! The per-transfer execution state machine.
//!
//! One [`ExecutionMachine`] drives one [`ExecutionItem`] from `pending` to a
//! terminal state:
//!
//! ```text
//! pending -> signing -> broadcasting -> in_block -> finalized
//!    ^          |             |             |
//!    +----------+-------------+-------------+   retry (classify + plan)
//!
//! any live state -> failed | cancelled
//! ```
//!
//! Each attempt probes (cached) capabilities for the targeted chain, builds the
//! call, simulates it, asks the signer, submits, and watches for inclusion and
//! finality. Any failure along the way is classified and handed to the retry
//! planner, whose single correction is applied before re-entering `pending`.
//!
//! Every suspension point races the cancel signal. On cancellation the live
//! submission subscription is unsubscribed before the item enters `cancelled`.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use dotexec_chain::{
    CallRequest, ChainFut, PreparedCall, TxStatus, TxSubscription, backoff_delay,
};
use dotexec_types::units::format_balance;
use dotexec_types::{
    BlockHash, ChainCapabilities, ErrorAnalysis, ErrorCategory, ExecutionResult,
    ExecutionSnapshot, ExecutionStatus, RetryStrategy, SimulationProgress, TransferVariant,
    TxHash,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};

use crate::cancel::CancelSignal;
use crate::context::EngineContext;
use crate::item::ExecutionItem;
use crate::observer::{ExecutionEvent, ObserverRegistry};
use crate::probe::{select_transfer_variant, supports_asset, validate_minimum};
use crate::transitions::TransitionError;

/// Why an attempt stopped short of finality.
enum AttemptError {
    /// Raw failure text, to be classified.
    Raw(String),
    /// Already classified (signer rejection).
    Analysed(ErrorAnalysis),
    /// The machine itself broke an invariant. Never retried.
    Internal(TransitionError),
    Cancelled,
}

impl AttemptError {
    fn raw(message: impl ToString) -> Self {
        Self::Raw(message.to_string())
    }
}

impl From<TransitionError> for AttemptError {
    fn from(err: TransitionError) -> Self {
        Self::Internal(err)
    }
}

/// Race `fut` against cancellation.
async fn guarded<F: Future>(cancel: &CancelSignal, fut: F) -> Result<F::Output, AttemptError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AttemptError::Cancelled),
        output = fut => Ok(output),
    }
}

// ============================================================================
// Subscription guard
// ============================================================================

/// Owns a submission subscription until it is unsubscribed.
struct SubscriptionGuard {
    tx_hash: TxHash,
    subscription: Option<Box<dyn TxSubscription>>,
}

impl SubscriptionGuard {
    fn new(subscription: Box<dyn TxSubscription>) -> Self {
        Self {
            tx_hash: subscription.tx_hash().clone(),
            subscription: Some(subscription),
        }
    }

    fn next_status(&mut self) -> ChainFut<'_, Option<TxStatus>> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next_status(),
            None => Box::pin(async { Ok(None) }),
        }
    }

    async fn unsubscribe(mut self) {
        if let Some(subscription) = self.subscription.take()
            && let Err(err) = subscription.unsubscribe().await
        {
            tracing::warn!(tx = %self.tx_hash, error = %err, "Failed to unsubscribe");
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        let unsubscribe = subscription.unsubscribe();
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = unsubscribe.await {
                    tracing::warn!(error = %err, "Failed to unsubscribe");
                }
            });
        } else {
            tracing::warn!(tx = %self.tx_hash, "No runtime to unsubscribe on");
        }
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Pushes snapshots and events to everyone watching one item.
struct Publisher {
    snapshots: watch::Sender<ExecutionSnapshot>,
    item_observers: ObserverRegistry,
    session_observers: ObserverRegistry,
}

impl Publisher {
    fn snapshot(&self, item: &ExecutionItem) {
        self.snapshots.send_replace(item.snapshot());
    }

    fn event(&self, event: &ExecutionEvent) {
        self.item_observers.publish(event);
        self.session_observers.publish(event);
    }
}

// ============================================================================
// Machine
// ============================================================================

pub struct ExecutionMachine {
    ctx: Arc<EngineContext>,
    item: ExecutionItem,
    publisher: Publisher,
}

impl ExecutionMachine {
    #[must_use]
    pub fn new(
        ctx: Arc<EngineContext>,
        item: ExecutionItem,
        session_observers: ObserverRegistry,
    ) -> Self {
        let (snapshots, _) = watch::channel(item.snapshot());
        Self {
            ctx,
            item,
            publisher: Publisher {
                snapshots,
                item_observers: ObserverRegistry::new(),
                session_observers,
            },
        }
    }

    #[must_use]
    pub fn item(&self) -> &ExecutionItem {
        &self.item
    }

    /// Latest snapshot, updated on every transition and progress report.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ExecutionSnapshot> {
        self.publisher.snapshots.subscribe()
    }

    /// Observers scoped to this item.
    #[must_use]
    pub fn observers(&self) -> ObserverRegistry {
        self.publisher.item_observers.clone()
    }

    /// Drive the item to a terminal state and return it.
    pub async fn run(mut self, cancel: CancelSignal) -> ExecutionItem {
        tracing::info!(
            item = %self.item.id(),
            chain = %self.item.chain(),
            amount = %self.item.intent().amount,
            "Execution started"
        );

        while !self.item.status().is_terminal() {
            let outcome = if cancel.is_cancelled() {
                Err(AttemptError::Cancelled)
            } else {
                self.attempt(&cancel).await
            };

            match outcome {
                Ok(()) => {}
                Err(AttemptError::Cancelled) => self.finish(ExecutionStatus::Cancelled),
                Err(AttemptError::Internal(err)) => {
                    tracing::error!(item = %self.item.id(), error = %err, "Execution invariant broken");
                    self.item
                        .record_error(self.ctx.classifier.classify(&err.to_string()));
                    self.finish(ExecutionStatus::Failed);
                }
                Err(AttemptError::Raw(raw)) => {
                    let analysis = self.ctx.classifier.classify(&raw);
                    self.recover(analysis, &cancel).await;
                }
                Err(AttemptError::Analysed(analysis)) => self.recover(analysis, &cancel).await,
            }
        }

        self.publisher.item_observers.clear();
        self.item
    }

    async fn attempt(&mut self, cancel: &CancelSignal) -> Result<(), AttemptError> {
        let ctx = Arc::clone(&self.ctx);
        let intent = self.item.intent().clone();
        let chain = self.item.chain();
        tracing::debug!(item = %self.item.id(), attempt = self.item.attempt(), chain = %chain, "Starting attempt");

        let connection = ctx.pool.get(chain).map_err(AttemptError::raw)?;
        let capabilities = guarded(cancel, ctx.probe.capabilities(connection.as_ref()))
            .await?
            .map_err(AttemptError::raw)?;
        validate_minimum(&capabilities).map_err(AttemptError::raw)?;
        if !supports_asset(&capabilities, &intent.asset) {
            return Err(AttemptError::Raw(format!(
                "Unknown asset {:?} on {}",
                intent.asset, capabilities.chain_name
            )));
        }

        let variant = self.choose_variant(&capabilities)?;
        let call = ctx
            .builder
            .build(CallRequest {
                capabilities: capabilities.as_ref(),
                intent: &intent,
                variant,
                overrides: self.item.overrides(),
            })
            .map_err(AttemptError::raw)?;
        self.item.set_metadata("chain_name", capabilities.chain_name.clone());
        self.item.set_metadata("call", call.label());

        // pending: simulate
        let simulation = {
            let item = &mut self.item;
            let publisher = &self.publisher;
            let mut on_progress = |progress: SimulationProgress| {
                item.set_simulation_progress(progress.clone());
                publisher.snapshot(item);
                publisher.event(&ExecutionEvent::SimulationProgress {
                    id: item.id(),
                    progress,
                });
            };
            guarded(
                cancel,
                ctx.simulator.simulate_reporting(
                    connection.as_ref(),
                    &call,
                    &intent.sender,
                    &mut on_progress,
                ),
            )
            .await?
        };
        self.item.record_simulation(simulation.clone());
        if !simulation.success {
            return Err(AttemptError::Raw(
                simulation
                    .failure_reason
                    .unwrap_or_else(|| "simulation failed".to_string()),
            ));
        }
        let token = &capabilities.native_token;
        self.item.set_metadata(
            "estimated_fee",
            format_balance(simulation.estimated_fee, token.decimals, &token.symbol),
        );
        self.transition(ExecutionStatus::Signing)?;

        // signing
        let signed = match guarded(cancel, ctx.signer.sign(&call, &intent.sender)).await? {
            Ok(signed) => signed,
            Err(rejection) => {
                tracing::info!(item = %self.item.id(), reason = %rejection.reason, "Signer rejected");
                return Err(AttemptError::Analysed(ErrorAnalysis::signer_rejected(
                    rejection.to_string(),
                )));
            }
        };
        self.transition(ExecutionStatus::Broadcasting)?;

        // broadcasting
        let subscription = guarded(cancel, connection.submit_and_watch(signed))
            .await?
            .map_err(AttemptError::raw)?;
        let mut subscription = SubscriptionGuard::new(subscription);
        self.item
            .set_metadata("tx_hash", subscription.tx_hash.to_string());
        let watched = self.watch_confirmation(&mut subscription, &call, cancel).await;
        subscription.unsubscribe().await;
        watched
    }

    /// Honour a forced variant when the chain has it; otherwise select normally.
    fn choose_variant(
        &self,
        capabilities: &ChainCapabilities,
    ) -> Result<TransferVariant, AttemptError> {
        let forced_allow_death = self.item.variant_override() == Some(TransferVariant::AllowDeath)
            && !self.item.intent().keep_alive;
        if forced_allow_death && capabilities.has_variant(TransferVariant::AllowDeath) {
            return Ok(TransferVariant::AllowDeath);
        }
        select_transfer_variant(
            capabilities,
            self.item.keep_alive_requested(),
            &self.item.intent().asset,
        )
        .map_err(AttemptError::raw)
    }

    /// Follow the subscription through inclusion and finality.
    async fn watch_confirmation(
        &mut self,
        subscription: &mut SubscriptionGuard,
        call: &PreparedCall,
        cancel: &CancelSignal,
    ) -> Result<(), AttemptError> {
        let tx_hash = subscription.tx_hash.clone();
        let timeouts = self.ctx.timeouts;

        // broadcasting -> in_block
        let deadline = Instant::now() + timeouts.inclusion;
        let mut included: Option<BlockHash> = None;
        while included.is_none() {
            let status = next_status(subscription, deadline, cancel, "block inclusion", &tx_hash).await?;
            match status {
                TxStatus::Ready | TxStatus::Broadcast => {
                    tracing::debug!(tx = %tx_hash, call = %call.label(), "Awaiting inclusion");
                }
                TxStatus::InBlock { block_hash, outcome } => {
                    if let Some(reason) = outcome.failure_reason() {
                        return Err(AttemptError::Raw(reason));
                    }
                    self.item.set_metadata("in_block", block_hash.to_string());
                    self.transition(ExecutionStatus::InBlock)?;
                    included = Some(block_hash);
                }
                TxStatus::Finalized { block_hash } => {
                    self.transition(ExecutionStatus::InBlock)?;
                    return self.finalize(tx_hash, block_hash);
                }
                other => return Err(AttemptError::Raw(rejection_reason(&other))),
            }
        }

        // in_block -> finalized
        let deadline = Instant::now() + timeouts.finality;
        loop {
            match next_status(subscription, deadline, cancel, "finality", &tx_hash).await? {
                TxStatus::Finalized { block_hash } => return self.finalize(tx_hash, block_hash),
                TxStatus::InBlock { block_hash, outcome } => {
                    // Re-included after a fork switch.
                    if let Some(reason) = outcome.failure_reason() {
                        return Err(AttemptError::Raw(reason));
                    }
                    self.item.set_metadata("in_block", block_hash.to_string());
                    self.publisher.snapshot(&self.item);
                }
                TxStatus::Ready | TxStatus::Broadcast => {}
                other => return Err(AttemptError::Raw(rejection_reason(&other))),
            }
        }
    }

    fn finalize(&mut self, tx_hash: TxHash, block_hash: BlockHash) -> Result<(), AttemptError> {
        self.item.set_result(ExecutionResult {
            tx_hash,
            block_hash,
        });
        self.transition(ExecutionStatus::Finalized)?;
        Ok(())
    }

    /// Classify-and-plan outcome of a failed attempt.
    async fn recover(&mut self, analysis: ErrorAnalysis, cancel: &CancelSignal) {
        let id = self.item.id();
        let attempt = self.item.attempt();
        tracing::info!(
            item = %id,
            attempt,
            chain = %self.item.chain(),
            category = %analysis.category,
            rule = analysis.matched_rule.as_deref().unwrap_or("-"),
            detail = %analysis.technical_details,
            "Attempt failed"
        );

        let strategy = if analysis.is_user_error() {
            None
        } else {
            self.ctx.planner.plan(
                &analysis,
                attempt,
                self.item.chain(),
                self.item.keep_alive_requested(),
            )
        };
        let category = analysis.category;
        self.item.record_error(analysis);

        let Some(strategy) = strategy else {
            self.finish(ExecutionStatus::Failed);
            return;
        };

        self.schedule_retry(&strategy, category);
        if strategy.directive.is_none() {
            let delay = backoff_delay(attempt.saturating_sub(1), &self.ctx.backoff);
            tracing::debug!(item = %id, delay_ms = delay.as_millis(), "Backing off before retry");
            if guarded(cancel, tokio::time::sleep(delay)).await.is_err() {
                self.finish(ExecutionStatus::Cancelled);
            }
        }
    }

    fn schedule_retry(&mut self, strategy: &RetryStrategy, category: ErrorCategory) {
        self.item.apply_strategy(strategy);
        tracing::info!(
            item = %self.item.id(),
            attempt = self.item.attempt(),
            chain = %self.item.chain(),
            directive = ?strategy.directive,
            reason = %strategy.reason,
            "Retry scheduled"
        );
        self.publisher.event(&ExecutionEvent::RetryScheduled {
            id: self.item.id(),
            attempt: self.item.attempt(),
            category,
            strategy: strategy.clone(),
        });
        if let Err(err) = self.transition(ExecutionStatus::Pending) {
            tracing::error!(item = %self.item.id(), error = %err, "Cannot re-enter pending");
            self.finish(ExecutionStatus::Failed);
        }
    }

    /// Enter a terminal state. Only fails if already terminal, which is logged.
    fn finish(&mut self, to: ExecutionStatus) {
        if let Err(err) = self.transition(to) {
            tracing::error!(item = %self.item.id(), error = %err, "Cannot finish execution");
        }
    }

    fn transition(&mut self, to: ExecutionStatus) -> Result<(), TransitionError> {
        let receipt = self.item.transition(to).inspect_err(|err| {
            tracing::error!(item = %self.item.id(), error = %err, "Rejected transition");
        })?;
        tracing::info!(
            item = %self.item.id(),
            attempt = self.item.attempt(),
            chain = %self.item.chain(),
            from = %receipt.from(),
            to = %receipt.to(),
            edge = ?receipt.edge(),
            "Execution transition"
        );
        self.publisher.snapshot(&self.item);
        self.publisher.event(&ExecutionEvent::StatusChanged {
            id: self.item.id(),
            from: receipt.from(),
            to: receipt.to(),
            attempt: self.item.attempt(),
            chain: self.item.chain(),
            at: Utc::now(),
        });
        Ok(())
    }
}

/// Next subscription status, bounded by `deadline` and raced against cancellation.
async fn next_status(
    subscription: &mut SubscriptionGuard,
    deadline: Instant,
    cancel: &CancelSignal,
    waiting_for: &str,
    tx_hash: &TxHash,
) -> Result<TxStatus, AttemptError> {
    match guarded(cancel, timeout_at(deadline, subscription.next_status())).await? {
        Err(_) => Err(AttemptError::Raw(format!(
            "Timeout waiting for {waiting_for} of {tx_hash}"
        ))),
        Ok(Err(err)) => Err(AttemptError::raw(err)),
        Ok(Ok(None)) => Err(AttemptError::Raw(format!(
            "connection closed before {waiting_for} of {tx_hash}"
        ))),
        Ok(Ok(Some(status))) => Ok(status),
    }
}

/// Failure text for pool-level rejections reported by the subscription.
fn rejection_reason(status: &TxStatus) -> String {
    match status {
        TxStatus::Dropped { reason } => format!("Transaction dropped: {reason}"),
        TxStatus::Invalid { reason } => format!("InvalidTransaction: {reason}"),
        TxStatus::Usurped { by } => format!("Transaction usurped by {by}"),
        TxStatus::Ready
        | TxStatus::Broadcast
        | TxStatus::InBlock { .. }
        | TxStatus::Finalized { .. } => format!("unexpected status {status:?}"),
    }
}
