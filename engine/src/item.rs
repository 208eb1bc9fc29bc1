//! One user-approved transfer and everything learned while executing it.

use chrono::{DateTime, Utc};
use dotexec_types::{
    ChainClass, ErrorAnalysis, ExecutionId, ExecutionResult, ExecutionSnapshot, ExecutionStatus,
    RetryDirective, RetryStrategy, SimulationProgress, SimulationResult, TransferIntent,
    TransferVariant,
};
use serde_json::{Map, Value};

use crate::transitions::{TransitionError, TransitionReceipt, transition_receipt};

/// Mutated only by the execution machine; everyone else reads snapshots.
#[derive(Debug, Clone)]
pub struct ExecutionItem {
    id: ExecutionId,
    status: ExecutionStatus,
    intent: TransferIntent,
    chain: ChainClass,
    attempt: u32,
    variant_override: Option<TransferVariant>,
    overrides: Map<String, Value>,
    last_error: Option<ErrorAnalysis>,
    last_simulation: Option<SimulationResult>,
    simulation: Option<SimulationProgress>,
    result: Option<ExecutionResult>,
    metadata: Map<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ExecutionItem {
    #[must_use]
    pub fn new(intent: TransferIntent) -> Self {
        let now = Utc::now();
        Self {
            id: ExecutionId::new(),
            status: ExecutionStatus::Pending,
            chain: intent.chain,
            intent,
            attempt: 1,
            variant_override: None,
            overrides: Map::new(),
            last_error: None,
            last_simulation: None,
            simulation: None,
            result: None,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ExecutionId {
        self.id
    }

    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    #[must_use]
    pub const fn intent(&self) -> &TransferIntent {
        &self.intent
    }

    /// Chain class the current attempt targets.
    #[must_use]
    pub const fn chain(&self) -> ChainClass {
        self.chain
    }

    /// 1-based number of the current attempt.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn variant_override(&self) -> Option<TransferVariant> {
        self.variant_override
    }

    #[must_use]
    pub const fn overrides(&self) -> &Map<String, Value> {
        &self.overrides
    }

    #[must_use]
    pub fn keep_alive_requested(&self) -> bool {
        self.intent.keep_alive || self.variant_override == Some(TransferVariant::KeepAlive)
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&ErrorAnalysis> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub const fn last_simulation(&self) -> Option<&SimulationResult> {
        self.last_simulation.as_ref()
    }

    #[must_use]
    pub const fn simulation_progress(&self) -> Option<&SimulationProgress> {
        self.simulation.as_ref()
    }

    #[must_use]
    pub const fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Read-only view for observers. Finalized and cancelled items expose no error.
    #[must_use]
    pub fn snapshot(&self) -> ExecutionSnapshot {
        let cancelled = self.status == ExecutionStatus::Cancelled;
        let settled = cancelled || self.status == ExecutionStatus::Finalized;
        let error = self.last_error.as_ref().filter(|_| !settled);
        ExecutionSnapshot {
            id: self.id,
            status: self.status,
            attempt: self.attempt,
            chain: self.chain,
            error_message: error.map(|e| e.user_message.clone()),
            error_details: error.map(|e| e.technical_details.clone()),
            simulation: self.simulation.clone(),
            result: self.result.clone(),
            cancelled,
            metadata: self.metadata.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Mutation (machine only)
    // ------------------------------------------------------------------------

    pub(crate) fn transition(
        &mut self,
        to: ExecutionStatus,
    ) -> Result<TransitionReceipt, TransitionError> {
        let receipt = transition_receipt(self.status, to)?;
        self.status = to;
        self.touch();
        Ok(receipt)
    }

    /// Apply one retry strategy and advance to the next attempt.
    pub(crate) fn apply_strategy(&mut self, strategy: &RetryStrategy) {
        match &strategy.directive {
            Some(RetryDirective::SwitchChain { to }) => self.chain = *to,
            Some(RetryDirective::ForceKeepAlive) => {
                self.variant_override = Some(TransferVariant::KeepAlive);
            }
            Some(RetryDirective::ForceAllowDeath) => {
                self.variant_override = Some(TransferVariant::AllowDeath);
            }
            Some(RetryDirective::AdjustParameters { parameters }) => {
                self.overrides
                    .extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            None => {}
        }
        self.attempt += 1;
        self.simulation = None;
        self.result = None;
        self.touch();
    }

    pub(crate) fn record_error(&mut self, analysis: ErrorAnalysis) {
        self.last_error = Some(analysis);
        self.touch();
    }

    pub(crate) fn record_simulation(&mut self, result: SimulationResult) {
        self.last_simulation = Some(result);
        self.touch();
    }

    pub(crate) fn set_simulation_progress(&mut self, progress: SimulationProgress) {
        self.simulation = Some(progress);
        self.touch();
    }

    pub(crate) fn set_result(&mut self, result: ExecutionResult) {
        self.result = Some(result);
        self.touch();
    }

    pub(crate) fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
