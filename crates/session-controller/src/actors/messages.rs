//! Registry actor mailbox messages.

use crate::errors::ScError;
use crate::models::{Participant, SessionHandle, SessionInfo};

use tokio::sync::oneshot;

/// Messages handled by the `SessionRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Create (or look up) a session.
    CreateSession {
        name: String,
        respond_to: oneshot::Sender<Result<SessionHandle, ScError>>,
    },

    /// Drop a session and cancel its scheduler.
    DeleteSession {
        name: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// Append a participant. Replies with the new roster length.
    AddParticipant {
        name: String,
        participant: Participant,
        respond_to: oneshot::Sender<Option<usize>>,
    },

    /// Remove the participant with this connection ID.
    RemoveParticipant {
        name: String,
        connection_id: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// Roster snapshot.
    GetParticipants {
        name: String,
        respond_to: oneshot::Sender<Vec<Participant>>,
    },

    /// Replace a session with a fresh, empty one.
    ResetParticipants {
        name: String,
        respond_to: oneshot::Sender<Result<Option<String>, ScError>>,
    },

    /// First-fit lookup, creating a session when all are full.
    FindOrCreateAvailable {
        respond_to: oneshot::Sender<Result<String, ScError>>,
    },

    /// First-fit lookup plus roster insert in one step.
    AssignParticipant {
        participant: Participant,
        respond_to: oneshot::Sender<Result<Assignment, ScError>>,
    },

    GetSession {
        name: String,
        respond_to: oneshot::Sender<Option<SessionInfo>>,
    },

    ListSessions {
        respond_to: oneshot::Sender<Vec<SessionInfo>>,
    },

    /// Start (or restart) the session's phase scheduler.
    StartScheduler {
        name: String,
        respond_to: oneshot::Sender<Result<(), ScError>>,
    },

    /// Cancel the session's phase scheduler.
    StopScheduler {
        name: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// Data needed to mint tokens outside the actor.
    GetTokenTargets {
        name: String,
        respond_to: oneshot::Sender<Option<TokenTargets>>,
    },

    /// Sent by a scheduler task after its last phase fired.
    SchedulerCompleted { name: String },
}

/// Result of assigning a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Session the participant was placed in.
    pub session: String,
    /// Roster length after the insert.
    pub roster_len: usize,
}

/// Provider session and roster names for token minting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTargets {
    pub provider_session_id: String,
    pub names: Vec<String>,
}
