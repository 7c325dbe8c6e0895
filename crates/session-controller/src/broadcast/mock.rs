//! Recording broadcaster for tests.

use super::Broadcaster;
use crate::errors::ScError;
use crate::models::ConnectionHandle;

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// One recorded send.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub connection_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Broadcaster that records every successful send.
///
/// Sends to connections registered with [`RecordingBroadcaster::fail_for`]
/// fail with [`ScError::Delivery`] and are not recorded.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    deliveries: Mutex<Vec<Delivery>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `connection_id` fail.
    pub fn fail_for(&self, connection_id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id.to_string());
    }

    /// All recorded sends, in order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends to one connection.
    #[must_use]
    pub fn deliveries_for(&self, connection_id: &str) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.connection_id == connection_id)
            .collect()
    }

    /// Sends of one event name.
    #[must_use]
    pub fn deliveries_for_event(&self, event: &str) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.event == event)
            .collect()
    }

    pub fn clear(&self) {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait::async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn send_to_connection(
        &self,
        connection: &ConnectionHandle,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ScError> {
        let connection_id = connection.connection_id().to_string();

        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&connection_id)
        {
            return Err(ScError::Delivery(format!(
                "connection {connection_id} unavailable"
            )));
        }

        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                connection_id,
                event: event.to_string(),
                payload: payload.clone(),
            });
        Ok(())
    }
}
