//! Durable "scheduler started" flags.
//!
//! One flag per session, keyed `session:{id}:timerFlag`. The flag exists once
//! the session's scheduler has been started and is removed when the session
//! finishes. [`SessionFlagStore::try_set`] is the atomic check-and-set used to
//! make sure only one trigger starts a given session.

use crate::errors::ScError;

use std::collections::HashSet;
use tokio::sync::RwLock;

/// Flag key for a session.
#[must_use]
pub fn flag_key(session: &str) -> String {
    format!("session:{session}:timerFlag")
}

/// Session flag persistence.
#[async_trait::async_trait]
pub trait SessionFlagStore: Send + Sync {
    /// `Some(true)` if the flag is set, `None` if it is absent.
    async fn get(&self, session: &str) -> Result<Option<bool>, ScError>;

    /// Set the flag unconditionally.
    async fn set(&self, session: &str) -> Result<(), ScError>;

    /// Remove the flag. Removing an absent flag is not an error.
    async fn delete(&self, session: &str) -> Result<(), ScError>;

    /// Set the flag only if it is absent. Returns whether this call set it.
    async fn try_set(&self, session: &str) -> Result<bool, ScError>;
}

/// Process-local flag store.
#[derive(Debug, Default)]
pub struct InMemoryFlagStore {
    keys: RwLock<HashSet<String>>,
}

impl InMemoryFlagStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flags currently set.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionFlagStore for InMemoryFlagStore {
    async fn get(&self, session: &str) -> Result<Option<bool>, ScError> {
        let keys = self.keys.read().await;
        Ok(keys.contains(&flag_key(session)).then_some(true))
    }

    async fn set(&self, session: &str) -> Result<(), ScError> {
        self.keys.write().await.insert(flag_key(session));
        Ok(())
    }

    async fn delete(&self, session: &str) -> Result<(), ScError> {
        self.keys.write().await.remove(&flag_key(session));
        Ok(())
    }

    async fn try_set(&self, session: &str) -> Result<bool, ScError> {
        Ok(self.keys.write().await.insert(flag_key(session)))
    }
}
