//! Event delivery to connected participants.
//!
//! A phase broadcast is one unicast send per roster member. A failed send is
//! logged and counted; it never stops delivery to the remaining members.

pub mod mock;

use crate::errors::ScError;
use crate::models::{ConnectionHandle, OutboundEvent, Participant};
use crate::observability::metrics;
use crate::phases::PhaseEvent;

use tracing::warn;

/// Delivers one event to one connection.
#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    async fn send_to_connection(
        &self,
        connection: &ConnectionHandle,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ScError>;
}

/// Broadcaster that queues events on the connection's outbound channel.
///
/// Never waits: a full queue counts as a failed delivery.
#[derive(Debug, Default, Clone)]
pub struct ChannelBroadcaster;

impl ChannelBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn send_to_connection(
        &self,
        connection: &ConnectionHandle,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ScError> {
        connection.try_deliver(OutboundEvent {
            event: event.to_string(),
            data: payload.clone(),
        })
    }
}

/// Outcome of one phase broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Send `event` to every member of `roster`, in roster order.
pub async fn deliver_phase(
    broadcaster: &dyn Broadcaster,
    roster: &[Participant],
    event: &PhaseEvent,
) -> DeliveryReport {
    let name = event.event_name();
    let payload = event.payload();
    let mut report = DeliveryReport::default();

    for participant in roster {
        match broadcaster
            .send_to_connection(&participant.connection, name, &payload)
            .await
        {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                metrics::record_broadcast_failure(name);
                warn!(
                    target: "sc.broadcast",
                    connection_id = %participant.connection_id(),
                    event = name,
                    error = %e,
                    "Failed to deliver phase event"
                );
            }
        }
    }

    report
}
