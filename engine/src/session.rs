//! Concurrent executions within one session.
//!
//! Each submitted transfer runs on its own tokio task with its own state
//! machine. Items share only the engine context: the connection pool and the
//! read-only capability cache. Nothing outlives the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dotexec_types::{ExecutionId, ExecutionSnapshot, ExecutionStatus, TransferIntent};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cancel::{CancelHandle, cancel_pair};
use crate::context::EngineContext;
use crate::item::ExecutionItem;
use crate::machine::ExecutionMachine;
use crate::observer::{ExecutionEvent, ObserverRegistry};

struct ItemEntry {
    snapshot: watch::Receiver<ExecutionSnapshot>,
    cancel: CancelHandle,
    observers: ObserverRegistry,
    task: JoinHandle<ExecutionItem>,
}

/// Counts of items per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_status: Vec<(ExecutionStatus, usize)>,
}

impl StatusSummary {
    #[must_use]
    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }

    /// Items not yet in a terminal state.
    #[must_use]
    pub fn active(&self) -> usize {
        self.by_status
            .iter()
            .filter(|(s, _)| !s.is_terminal())
            .map(|(_, n)| n)
            .sum()
    }
}

pub struct ExecutionSession {
    ctx: Arc<EngineContext>,
    items: Mutex<HashMap<ExecutionId, ItemEntry>>,
    observers: ObserverRegistry,
}

impl ExecutionSession {
    #[must_use]
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            items: Mutex::new(HashMap::new()),
            observers: ObserverRegistry::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Queue a transfer and start executing it. Must be called within a tokio runtime.
    pub fn submit(&self, intent: TransferIntent) -> ExecutionId {
        let item = ExecutionItem::new(intent);
        let id = item.id();
        let machine = ExecutionMachine::new(Arc::clone(&self.ctx), item, self.observers.clone());
        let snapshot = machine.watch();
        let observers = machine.observers();
        let (cancel, signal) = cancel_pair();
        let task = tokio::spawn(machine.run(signal));

        tracing::debug!(item = %id, "Execution submitted");
        self.lock().insert(
            id,
            ItemEntry {
                snapshot,
                cancel,
                observers,
                task,
            },
        );
        id
    }

    #[must_use]
    pub fn snapshot(&self, id: ExecutionId) -> Option<ExecutionSnapshot> {
        self.lock()
            .get(&id)
            .map(|entry| entry.snapshot.borrow().clone())
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ExecutionId> {
        self.lock().keys().copied().collect()
    }

    /// Request cancellation. Returns `false` for unknown ids.
    pub fn cancel(&self, id: ExecutionId) -> bool {
        match self.lock().get(&id) {
            Some(entry) => {
                tracing::info!(item = %id, "Cancellation requested");
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait until the item is terminal and return its final snapshot.
    pub async fn wait(&self, id: ExecutionId) -> Option<ExecutionSnapshot> {
        let mut snapshot = self.lock().get(&id).map(|entry| entry.snapshot.clone())?;
        // Err means the machine is gone; its last published snapshot is final.
        let _ = snapshot.wait_for(|s| s.status.is_terminal()).await;
        let last = snapshot.borrow().clone();
        Some(last)
    }

    /// Forget an item, cancelling it first if still live. Its observers are dropped.
    pub fn discard(&self, id: ExecutionId) -> bool {
        let Some(entry) = self.lock().remove(&id) else {
            return false;
        };
        if !entry.snapshot.borrow().status.is_terminal() {
            entry.cancel.cancel();
        }
        entry.observers.clear();
        drop(entry.task);
        tracing::debug!(item = %id, "Execution discarded");
        true
    }

    /// Events from every item in the session.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        self.observers.subscribe()
    }

    /// Events from one item; `None` for unknown ids.
    #[must_use]
    pub fn subscribe_item(&self, id: ExecutionId) -> Option<mpsc::UnboundedReceiver<ExecutionEvent>> {
        self.lock().get(&id).map(|entry| entry.observers.subscribe())
    }

    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        let items = self.lock();
        let by_status = ExecutionStatus::all()
            .iter()
            .map(|status| {
                let n = items
                    .values()
                    .filter(|entry| entry.snapshot.borrow().status == *status)
                    .count();
                (*status, n)
            })
            .collect();
        StatusSummary {
            total: items.len(),
            by_status,
        }
    }

    /// Cancel everything still running and wait for the tasks to wind down.
    pub async fn shutdown(&self) {
        let entries: Vec<_> = self.lock().drain().map(|(_, entry)| entry).collect();
        for entry in &entries {
            entry.cancel.cancel();
        }
        let results = join_all(entries.into_iter().map(|entry| entry.task)).await;
        for err in results.into_iter().filter_map(Result::err) {
            tracing::warn!(error = %err, "Execution task ended abnormally");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ExecutionId, ItemEntry>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
