//! Shared registry of live chain connections, keyed by chain class.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use dotexec_types::ChainClass;
use tracing::debug;

use crate::{ChainConnection, ChainError};

/// Connections are inserted by whoever owns their lifecycle and looked up by
/// the engine on every attempt. The lock is only held for the map operation,
/// never across an await.
#[derive(Default)]
pub struct ConnectionPool {
    connections: RwLock<HashMap<ChainClass, Arc<dyn ChainConnection>>>,
}

impl ConnectionPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its own chain class, replacing any previous one.
    pub fn insert(&self, connection: Arc<dyn ChainConnection>) -> Option<Arc<dyn ChainConnection>> {
        let class = connection.chain_class();
        debug!(chain = %class, genesis = %connection.genesis_hash(), "Registering connection");
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class, connection)
    }

    pub fn get(&self, class: ChainClass) -> Result<Arc<dyn ChainConnection>, ChainError> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&class)
            .cloned()
            .ok_or(ChainError::Unavailable(class))
    }

    pub fn remove(&self, class: ChainClass) -> Option<Arc<dyn ChainConnection>> {
        debug!(chain = %class, "Removing connection");
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&class)
    }

    /// Registered chain classes, sorted.
    #[must_use]
    pub fn classes(&self) -> Vec<ChainClass> {
        let mut classes: Vec<_> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        classes.sort();
        classes
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("classes", &self.classes())
            .finish()
    }
}
