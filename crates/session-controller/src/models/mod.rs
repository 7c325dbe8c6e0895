//! Data types shared by the registry, scheduler and transport adapters.

use crate::actors::SchedulerState;
use crate::errors::ScError;

use serde::Serialize;
use tokio::sync::mpsc;

/// An event queued for delivery to one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    /// Event name (e.g. `introduce`, `keyword`).
    pub event: String,
    /// Event payload.
    pub data: serde_json::Value,
}

/// Opaque transport-layer reference to one connected client.
///
/// The core never inspects what flows through it; it only hands events to
/// the connection's outbound queue. Equality is by connection ID.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: String,
    sender: mpsc::Sender<OutboundEvent>,
}

impl ConnectionHandle {
    /// Create a connection handle and the receiving end of its outbound queue.
    #[must_use]
    pub fn new(
        connection_id: impl Into<String>,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (
            Self {
                connection_id: connection_id.into(),
                sender,
            },
            receiver,
        )
    }

    /// Get the connection ID.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Queue an event without waiting.
    ///
    /// Fails if the queue is full or the transport side has gone away.
    pub fn try_deliver(&self, event: OutboundEvent) -> Result<(), ScError> {
        self.sender.try_send(event).map_err(|e| {
            ScError::Delivery(format!(
                "connection {} rejected event: {e}",
                self.connection_id
            ))
        })
    }

    /// Whether the transport side has dropped its receiver.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.connection_id == other.connection_id
    }
}

impl Eq for ConnectionHandle {}

/// A roster member. Display names are not unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Display name.
    pub name: String,
    /// Delivery handle.
    pub connection: ConnectionHandle,
}

impl Participant {
    #[must_use]
    pub fn new(name: impl Into<String>, connection: ConnectionHandle) -> Self {
        Self {
            name: name.into(),
            connection,
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        self.connection.connection_id()
    }
}

/// Handle returned by session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Local session name.
    pub name: String,
    /// Backing session ID at the media provider.
    pub provider_session_id: String,
    /// Creation timestamp (unix seconds).
    pub created_at: i64,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub provider_session_id: String,
    pub created_at: i64,
    pub participant_count: usize,
    pub scheduler: SchedulerState,
}

/// A minted media access token for one roster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantToken {
    /// Participant display name.
    pub participant: String,
    /// Provider token.
    pub token: String,
}
