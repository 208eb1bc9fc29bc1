//! Observer registration for execution events.
//!
//! Observers are scoped: each execution owns a registry, and the session owns
//! one more that sees every item. Dropping the registry ends every receiver's
//! stream, so observers are torn down with their scope.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dotexec_types::{
    ChainClass, ErrorCategory, ExecutionId, ExecutionStatus, RetryStrategy, SimulationProgress,
};
use serde::Serialize;
use tokio::sync::mpsc;

/// Something an observer may want to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    StatusChanged {
        id: ExecutionId,
        from: ExecutionStatus,
        to: ExecutionStatus,
        attempt: u32,
        chain: ChainClass,
        at: DateTime<Utc>,
    },
    SimulationProgress {
        id: ExecutionId,
        progress: SimulationProgress,
    },
    /// A failed attempt is being retried. `attempt` is the upcoming attempt number.
    RetryScheduled {
        id: ExecutionId,
        attempt: u32,
        category: ErrorCategory,
        strategy: RetryStrategy,
    },
}

impl ExecutionEvent {
    #[must_use]
    pub const fn id(&self) -> ExecutionId {
        match self {
            Self::StatusChanged { id, .. }
            | Self::SimulationProgress { id, .. }
            | Self::RetryScheduled { id, .. } => *id,
        }
    }
}

/// Fan-out of execution events to any number of subscribers.
///
/// Closed receivers are pruned on the next publish.
#[derive(Debug, Clone, Default)]
pub struct ObserverRegistry {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<ExecutionEvent>>>>,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: &ExecutionEvent) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drop every subscriber, ending their streams.
    pub fn clear(&self) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
