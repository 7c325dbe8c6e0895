//! `SessionRegistryActor` - owner of every session and roster.
//!
//! All roster mutations, the first-fit assignment scan and the schedulers'
//! roster reads go through this actor's mailbox, so they are serialized
//! without locks.
//!
//! # Ownership
//!
//! ```text
//! SessionRegistryActor (singleton)
//! └── Session (creation order)
//!     ├── roster: Vec<Participant> (insertion order)
//!     └── PhaseSchedulerHandle (once started)
//! ```
//!
//! Scheduler tasks get a child of the registry's `CancellationToken`, so
//! cancelling the registry stops every timer.
//!
//! # Completed sessions
//!
//! A session whose timeline ran to the end is closed to assignment. Its name
//! is published to [`SessionRegistryHandle::subscribe_completed`] so the
//! owner can clear external state and retire it.
//!
//! # Unknown sessions
//!
//! Roster operations on an unknown name are logged and degrade to an empty
//! or `false`/`None` result. Only provider failures and a dead actor surface
//! as errors.

use crate::broadcast::Broadcaster;
use crate::errors::ScError;
use crate::models::{Participant, ParticipantToken, SessionHandle, SessionInfo};
use crate::observability::metrics;
use crate::phases::Timeline;
use crate::provider::{Capability, MediaProvider};

use super::messages::{Assignment, RegistryMessage, TokenTargets};
use super::scheduler::{PhaseScheduler, PhaseSchedulerHandle, SchedulerHost, SchedulerState};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Registry mailbox size.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Completion notifications buffered per subscriber.
const COMPLETED_CHANNEL_BUFFER: usize = 256;

/// Registry settings.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Roster size at which the assignment policy stops choosing a session.
    pub session_capacity: usize,
    /// Phase table used for every scheduler.
    pub timeline: Timeline,
    /// Scheduler tick interval.
    pub tick_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            session_capacity: crate::config::DEFAULT_SESSION_CAPACITY,
            timeline: Timeline::standard(),
            tick_interval: Duration::from_millis(crate::config::DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

/// Generate a fresh session name: `session-<unix-millis>-<8 hex>`.
///
/// The random suffix keeps names unique when two sessions are created within
/// the same millisecond.
#[must_use]
pub fn generate_session_name() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let short_suffix = suffix.get(..8).unwrap_or("00000000");
    format!("session-{millis}-{short_suffix}")
}

/// Handle to the `SessionRegistryActor`.
///
/// Cheap to clone. Every method round-trips through the actor mailbox.
#[derive(Clone)]
pub struct SessionRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
    provider: Arc<dyn MediaProvider>,
    completed: broadcast::Sender<String>,
}

impl SessionRegistryHandle {
    /// Spawn the registry actor and return a handle to it.
    #[must_use]
    pub fn new(
        instance_id: String,
        config: RegistryConfig,
        provider: Arc<dyn MediaProvider>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let (completed, _) = broadcast::channel(COMPLETED_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = SessionRegistryActor {
            instance_id,
            receiver,
            scheduler_host: Arc::new(RegistrySchedulerHost {
                sender: sender.downgrade(),
            }),
            cancel_token: cancel_token.clone(),
            config,
            provider: Arc::clone(&provider),
            broadcaster,
            completed: completed.clone(),
            sessions: Vec::new(),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            provider,
            completed,
        }
    }

    /// Send a request and wait for the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T, ScError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| ScError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| ScError::Internal(format!("response receive failed: {e}")))
    }

    /// Create a session, or return the existing one with this name.
    pub async fn create_session(&self, name: &str) -> Result<SessionHandle, ScError> {
        self.request(|respond_to| RegistryMessage::CreateSession {
            name: name.to_string(),
            respond_to,
        })
        .await?
    }

    /// Delete a session. Returns `false` if the name was unknown.
    pub async fn delete_session(&self, name: &str) -> Result<bool, ScError> {
        self.request(|respond_to| RegistryMessage::DeleteSession {
            name: name.to_string(),
            respond_to,
        })
        .await
    }

    /// Append `participant` to the roster.
    ///
    /// Returns the new roster length, or `None` if the session is unknown.
    /// Capacity is not checked here.
    pub async fn add_participant(
        &self,
        name: &str,
        participant: Participant,
    ) -> Result<Option<usize>, ScError> {
        self.request(|respond_to| RegistryMessage::AddParticipant {
            name: name.to_string(),
            participant,
            respond_to,
        })
        .await
    }

    /// Remove the participant whose connection ID matches.
    pub async fn remove_participant(
        &self,
        name: &str,
        connection_id: &str,
    ) -> Result<bool, ScError> {
        self.request(|respond_to| RegistryMessage::RemoveParticipant {
            name: name.to_string(),
            connection_id: connection_id.to_string(),
            respond_to,
        })
        .await
    }

    /// Roster snapshot; empty if the session is unknown.
    pub async fn get_participants(&self, name: &str) -> Result<Vec<Participant>, ScError> {
        self.request(|respond_to| RegistryMessage::GetParticipants {
            name: name.to_string(),
            respond_to,
        })
        .await
    }

    /// Create a fresh, empty session to replace `name` and return its name.
    ///
    /// The old entry stays registered with its roster; only its scheduler is
    /// cancelled. Returns `None` if `name` is unknown.
    pub async fn reset_participants(&self, name: &str) -> Result<Option<String>, ScError> {
        self.request(|respond_to| RegistryMessage::ResetParticipants {
            name: name.to_string(),
            respond_to,
        })
        .await?
    }

    /// First session (creation order) with spare capacity, creating one if
    /// every session is full.
    pub async fn find_or_create_available_session(&self) -> Result<String, ScError> {
        self.request(|respond_to| RegistryMessage::FindOrCreateAvailable { respond_to })
            .await?
    }

    /// Place `participant` in the first session with spare capacity.
    ///
    /// Lookup and insert happen in a single actor step, so concurrent joins
    /// never overfill a session.
    pub async fn assign_participant(&self, participant: Participant) -> Result<Assignment, ScError> {
        self.request(|respond_to| RegistryMessage::AssignParticipant {
            participant,
            respond_to,
        })
        .await?
    }

    pub async fn get_session(&self, name: &str) -> Result<Option<SessionInfo>, ScError> {
        self.request(|respond_to| RegistryMessage::GetSession {
            name: name.to_string(),
            respond_to,
        })
        .await
    }

    /// All sessions in creation order.
    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, ScError> {
        self.request(|respond_to| RegistryMessage::ListSessions { respond_to })
            .await
    }

    /// Start the phase scheduler, replacing any existing one.
    ///
    /// # Errors
    ///
    /// `ScError::NotFound` if the session is unknown.
    pub async fn start_scheduler(&self, name: &str) -> Result<(), ScError> {
        self.request(|respond_to| RegistryMessage::StartScheduler {
            name: name.to_string(),
            respond_to,
        })
        .await?
    }

    /// Stop and remove the phase scheduler. Returns `false` if none was running.
    pub async fn stop_scheduler(&self, name: &str) -> Result<bool, ScError> {
        self.request(|respond_to| RegistryMessage::StopScheduler {
            name: name.to_string(),
            respond_to,
        })
        .await
    }

    /// Mint a publisher token for every roster member.
    ///
    /// All-or-nothing: any failure (including an unknown session) yields an
    /// empty vector. Use [`Self::try_generate_tokens`] to see the failure.
    pub async fn generate_tokens(&self, name: &str) -> Vec<ParticipantToken> {
        match self.try_generate_tokens(name).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    target: "sc.actor.registry",
                    session = %name,
                    error = %e,
                    "Token generation failed"
                );
                Vec::new()
            }
        }
    }

    /// Mint a publisher token for every roster member, surfacing failures.
    ///
    /// Requests run concurrently outside the actor.
    ///
    /// # Errors
    ///
    /// - `ScError::NotFound` if the session is unknown
    /// - `ScError::PartialFailure` if any request failed
    pub async fn try_generate_tokens(&self, name: &str) -> Result<Vec<ParticipantToken>, ScError> {
        let targets = self
            .request(|respond_to| RegistryMessage::GetTokenTargets {
                name: name.to_string(),
                respond_to,
            })
            .await?
            .ok_or_else(|| ScError::NotFound(name.to_string()))?;

        let total = targets.names.len();
        let requests = targets.names.iter().map(|participant| {
            self.provider.mint_token(
                &targets.provider_session_id,
                participant,
                Capability::Publisher,
            )
        });
        let results = futures::future::join_all(requests).await;

        let mut tokens = Vec::with_capacity(total);
        let mut failed = 0;
        for (participant, result) in targets.names.iter().zip(results) {
            match result {
                Ok(token) => tokens.push(ParticipantToken {
                    participant: participant.clone(),
                    token,
                }),
                Err(e) => {
                    failed += 1;
                    debug!(
                        target: "sc.actor.registry",
                        session = %name,
                        error = %e,
                        "Token request failed"
                    );
                }
            }
        }

        if failed > 0 {
            return Err(ScError::PartialFailure { failed, total });
        }
        Ok(tokens)
    }

    /// Names of sessions whose timeline ran to the end, from now on.
    #[must_use]
    pub fn subscribe_completed(&self) -> broadcast::Receiver<String> {
        self.completed.subscribe()
    }

    /// Cancel the actor and every scheduler it owns.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Child token for tasks that should stop with the registry.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Roster reads and completion reports for schedulers, routed through the
/// registry mailbox.
///
/// Holds a weak sender so schedulers do not keep the actor alive.
struct RegistrySchedulerHost {
    sender: mpsc::WeakSender<RegistryMessage>,
}

#[async_trait::async_trait]
impl SchedulerHost for RegistrySchedulerHost {
    async fn roster(&self, session: &str) -> Vec<Participant> {
        let Some(sender) = self.sender.upgrade() else {
            return Vec::new();
        };

        let (tx, rx) = oneshot::channel();
        let message = RegistryMessage::GetParticipants {
            name: session.to_string(),
            respond_to: tx,
        };
        if sender.send(message).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    async fn timeline_completed(&self, session: &str) {
        if let Some(sender) = self.sender.upgrade() {
            let _ = sender
                .send(RegistryMessage::SchedulerCompleted {
                    name: session.to_string(),
                })
                .await;
        }
    }
}

/// One registered session.
struct Session {
    name: String,
    provider_session_id: String,
    created_at: i64,
    roster: Vec<Participant>,
    scheduler: Option<PhaseSchedulerHandle>,
}

impl Session {
    fn handle(&self) -> SessionHandle {
        SessionHandle {
            name: self.name.clone(),
            provider_session_id: self.provider_session_id.clone(),
            created_at: self.created_at,
        }
    }

    fn scheduler_state(&self) -> SchedulerState {
        self.scheduler
            .as_ref()
            .map_or(SchedulerState::Idle, PhaseSchedulerHandle::state)
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            name: self.name.clone(),
            provider_session_id: self.provider_session_id.clone(),
            created_at: self.created_at,
            participant_count: self.roster.len(),
            scheduler: self.scheduler_state(),
        }
    }
}

/// The registry actor state.
struct SessionRegistryActor {
    instance_id: String,
    receiver: mpsc::Receiver<RegistryMessage>,
    scheduler_host: Arc<RegistrySchedulerHost>,
    cancel_token: CancellationToken,
    config: RegistryConfig,
    provider: Arc<dyn MediaProvider>,
    broadcaster: Arc<dyn Broadcaster>,
    completed: broadcast::Sender<String>,
    /// Sessions in creation order.
    sessions: Vec<Session>,
}

impl SessionRegistryActor {
    #[instrument(skip_all, name = "sc.actor.registry", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "sc.actor.registry",
            instance_id = %self.instance_id,
            capacity = self.config.session_capacity,
            "SessionRegistryActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sc.actor.registry",
                        instance_id = %self.instance_id,
                        "SessionRegistryActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!(
                                target: "sc.actor.registry",
                                instance_id = %self.instance_id,
                                "SessionRegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        // Also marks the registry dead for handles when the mailbox closed.
        self.cancel_token.cancel();
        for session in &self.sessions {
            if let Some(scheduler) = &session.scheduler {
                scheduler.stop();
            }
        }

        info!(
            target: "sc.actor.registry",
            instance_id = %self.instance_id,
            sessions_remaining = self.sessions.len(),
            "SessionRegistryActor stopped"
        );
    }

    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::CreateSession { name, respond_to } => {
                let result = self.create_session(name).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::DeleteSession { name, respond_to } => {
                let _ = respond_to.send(self.delete_session(&name));
            }

            RegistryMessage::AddParticipant {
                name,
                participant,
                respond_to,
            } => {
                let _ = respond_to.send(self.add_participant(&name, participant));
            }

            RegistryMessage::RemoveParticipant {
                name,
                connection_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.remove_participant(&name, &connection_id));
            }

            RegistryMessage::GetParticipants { name, respond_to } => {
                let roster = self
                    .session(&name)
                    .map(|s| s.roster.clone())
                    .unwrap_or_default();
                let _ = respond_to.send(roster);
            }

            RegistryMessage::ResetParticipants { name, respond_to } => {
                let result = self.reset_participants(&name).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::FindOrCreateAvailable { respond_to } => {
                let result = self.find_or_create_available().await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::AssignParticipant {
                participant,
                respond_to,
            } => {
                let result = self.assign_participant(participant).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetSession { name, respond_to } => {
                let _ = respond_to.send(self.session(&name).map(Session::info));
            }

            RegistryMessage::ListSessions { respond_to } => {
                let _ = respond_to.send(self.sessions.iter().map(Session::info).collect());
            }

            RegistryMessage::StartScheduler { name, respond_to } => {
                let _ = respond_to.send(self.start_scheduler(&name));
            }

            RegistryMessage::StopScheduler { name, respond_to } => {
                let _ = respond_to.send(self.stop_scheduler(&name));
            }

            RegistryMessage::GetTokenTargets { name, respond_to } => {
                let targets = self.session(&name).map(|s| TokenTargets {
                    provider_session_id: s.provider_session_id.clone(),
                    names: s.roster.iter().map(|p| p.name.clone()).collect(),
                });
                let _ = respond_to.send(targets);
            }

            RegistryMessage::SchedulerCompleted { name } => {
                self.scheduler_completed(name);
            }
        }
    }

    fn session(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.name == name)
    }

    fn session_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.name == name)
    }

    async fn create_session(&mut self, name: String) -> Result<SessionHandle, ScError> {
        if let Some(existing) = self.session(&name) {
            info!(
                target: "sc.actor.registry",
                session = %name,
                "Session already exists"
            );
            return Ok(existing.handle());
        }

        let provider_session_id = self.provider.create_session().await.map_err(|e| {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                error = %e,
                "Provider failed to create session"
            );
            e
        })?;

        let session = Session {
            name,
            provider_session_id,
            created_at: chrono::Utc::now().timestamp(),
            roster: Vec::new(),
            scheduler: None,
        };
        let handle = session.handle();
        self.sessions.push(session);
        metrics::set_sessions_active(self.sessions.len());

        info!(
            target: "sc.actor.registry",
            session = %handle.name,
            provider_session_id = %handle.provider_session_id,
            total_sessions = self.sessions.len(),
            "Session created"
        );

        Ok(handle)
    }

    fn delete_session(&mut self, name: &str) -> bool {
        let Some(index) = self.sessions.iter().position(|s| s.name == name) else {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                "Delete requested for unknown session"
            );
            return false;
        };

        let session = self.sessions.remove(index);
        if let Some(scheduler) = &session.scheduler {
            scheduler.stop();
        }
        metrics::set_sessions_active(self.sessions.len());

        info!(
            target: "sc.actor.registry",
            session = %name,
            participants = session.roster.len(),
            total_sessions = self.sessions.len(),
            "Session deleted"
        );
        true
    }

    fn add_participant(&mut self, name: &str, participant: Participant) -> Option<usize> {
        let Some(session) = self.session_mut(name) else {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                connection_id = %participant.connection_id(),
                "Add participant to unknown session"
            );
            return None;
        };

        debug!(
            target: "sc.actor.registry",
            session = %name,
            connection_id = %participant.connection_id(),
            "Participant added"
        );
        session.roster.push(participant);
        Some(session.roster.len())
    }

    fn remove_participant(&mut self, name: &str, connection_id: &str) -> bool {
        let Some(session) = self.session_mut(name) else {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                connection_id = %connection_id,
                "Remove participant from unknown session"
            );
            return false;
        };

        let Some(index) = session
            .roster
            .iter()
            .position(|p| p.connection_id() == connection_id)
        else {
            debug!(
                target: "sc.actor.registry",
                session = %name,
                connection_id = %connection_id,
                "Participant not in roster"
            );
            return false;
        };

        session.roster.remove(index);
        debug!(
            target: "sc.actor.registry",
            session = %name,
            connection_id = %connection_id,
            remaining = session.roster.len(),
            "Participant removed"
        );
        true
    }

    async fn reset_participants(&mut self, name: &str) -> Result<Option<String>, ScError> {
        if self.session(name).is_none() {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                "Reset requested for unknown session"
            );
            return Ok(None);
        }

        // The old timeline keeps running if the replacement cannot be created.
        let replacement = self.create_session(generate_session_name()).await?;

        if let Some(scheduler) = self
            .session_mut(name)
            .and_then(|old| old.scheduler.take())
        {
            scheduler.stop();
        }

        info!(
            target: "sc.actor.registry",
            session = %name,
            replacement = %replacement.name,
            "Session reset"
        );
        Ok(Some(replacement.name))
    }

    /// First-fit scan in creation order. Completed sessions are skipped.
    fn first_available(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| {
            s.roster.len() < self.config.session_capacity
                && s.scheduler_state() != SchedulerState::Completed
        })
    }

    async fn find_or_create_available(&mut self) -> Result<String, ScError> {
        if let Some(session) = self.first_available() {
            return Ok(session.name.clone());
        }

        let handle = self.create_session(generate_session_name()).await?;
        Ok(handle.name)
    }

    async fn assign_participant(&mut self, participant: Participant) -> Result<Assignment, ScError> {
        let session = self.find_or_create_available().await?;
        let roster_len = self
            .add_participant(&session, participant)
            .ok_or_else(|| ScError::Internal("assigned session disappeared".to_string()))?;

        Ok(Assignment {
            session,
            roster_len,
        })
    }

    fn start_scheduler(&mut self, name: &str) -> Result<(), ScError> {
        let timeline = self.config.timeline.clone();
        let tick_interval = self.config.tick_interval;
        let host: Arc<dyn SchedulerHost> = self.scheduler_host.clone();
        let broadcaster = Arc::clone(&self.broadcaster);
        let token = self.cancel_token.child_token();

        let Some(session) = self.session_mut(name) else {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                "Start requested for unknown session"
            );
            return Err(ScError::NotFound(name.to_string()));
        };

        if let Some(previous) = session.scheduler.take() {
            info!(
                target: "sc.actor.registry",
                session = %name,
                previous_state = previous.state().as_str(),
                "Restarting phase scheduler"
            );
            previous.stop();
        }

        session.scheduler = Some(PhaseScheduler::spawn(
            name.to_string(),
            timeline,
            tick_interval,
            host,
            broadcaster,
            token,
        ));

        info!(
            target: "sc.actor.registry",
            session = %name,
            participants = session.roster.len(),
            "Phase scheduler started"
        );
        Ok(())
    }

    /// Publish a completion unless the report is stale (session deleted or
    /// scheduler restarted since).
    fn scheduler_completed(&self, name: String) {
        let Some(session) = self.session(&name) else {
            debug!(
                target: "sc.actor.registry",
                session = %name,
                "Completion reported for removed session"
            );
            return;
        };
        if session.scheduler_state() != SchedulerState::Completed {
            debug!(
                target: "sc.actor.registry",
                session = %name,
                "Ignoring stale completion report"
            );
            return;
        }

        info!(
            target: "sc.actor.registry",
            session = %name,
            participants = session.roster.len(),
            "Session timeline completed"
        );
        // No subscribers is fine.
        let _ = self.completed.send(name);
    }

    fn stop_scheduler(&mut self, name: &str) -> bool {
        let Some(session) = self.session_mut(name) else {
            warn!(
                target: "sc.actor.registry",
                session = %name,
                "Stop requested for unknown session"
            );
            return false;
        };

        match session.scheduler.take() {
            Some(scheduler) => {
                scheduler.stop();
                info!(
                    target: "sc.actor.registry",
                    session = %name,
                    "Phase scheduler stopped"
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::broadcast::mock::RecordingBroadcaster;
    use crate::models::ConnectionHandle;
    use crate::provider::mock::MockMediaProvider;

    fn registry_with(provider: Arc<MockMediaProvider>) -> SessionRegistryHandle {
        SessionRegistryHandle::new(
            "sc-test".to_string(),
            RegistryConfig::default(),
            provider,
            Arc::new(RecordingBroadcaster::new()),
        )
    }

    fn participant(name: &str, connection_id: &str) -> Participant {
        let (handle, _rx) = ConnectionHandle::new(connection_id, 8);
        Participant::new(name, handle)
    }

    #[test]
    fn test_generated_names_are_unique_and_well_formed() {
        let a = generate_session_name();
        let b = generate_session_name();

        assert_ne!(a, b);
        let parts: Vec<&str> = a.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_session_is_idempotent() {
        let provider = Arc::new(MockMediaProvider::new());
        let registry = registry_with(provider.clone());

        let first = registry.create_session("session-a").await.unwrap();
        let second = registry.create_session("session-a").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.sessions_created(), 1);
        assert_eq!(registry.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_session_provider_failure() {
        let provider = Arc::new(MockMediaProvider::failing());
        let registry = registry_with(provider);

        let result = registry.create_session("session-a").await;
        assert!(matches!(result, Err(ScError::ProviderUnavailable(_))));
        assert!(registry.get_session("session-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_operations_degrade() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));

        assert!(!registry.delete_session("ghost").await.unwrap());
        assert_eq!(
            registry
                .add_participant("ghost", participant("Alice", "c1"))
                .await
                .unwrap(),
            None
        );
        assert!(!registry.remove_participant("ghost", "c1").await.unwrap());
        assert!(registry.get_participants("ghost").await.unwrap().is_empty());
        assert_eq!(registry.reset_participants("ghost").await.unwrap(), None);
        assert!(!registry.stop_scheduler("ghost").await.unwrap());
        assert!(matches!(
            registry.start_scheduler("ghost").await,
            Err(ScError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_roster_keeps_insertion_order() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));
        registry.create_session("s").await.unwrap();

        for (i, name) in ["Alice", "Bob", "Carol"].iter().enumerate() {
            let len = registry
                .add_participant("s", participant(name, &format!("c{i}")))
                .await
                .unwrap();
            assert_eq!(len, Some(i + 1));
        }

        let names: Vec<String> = registry
            .get_participants("s")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[tokio::test]
    async fn test_remove_by_connection_id_with_duplicate_names() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));
        registry.create_session("s").await.unwrap();
        registry
            .add_participant("s", participant("Alice", "c1"))
            .await
            .unwrap();
        registry
            .add_participant("s", participant("Alice", "c2"))
            .await
            .unwrap();

        assert!(registry.remove_participant("s", "c1").await.unwrap());
        assert!(!registry.remove_participant("s", "c1").await.unwrap());

        let roster = registry.get_participants("s").await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Alice");
        assert_eq!(roster[0].connection_id(), "c2");
    }

    #[tokio::test]
    async fn test_direct_add_may_exceed_capacity() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));
        registry.create_session("s").await.unwrap();

        for i in 0..8 {
            registry
                .add_participant("s", participant("P", &format!("c{i}")))
                .await
                .unwrap();
        }
        assert_eq!(registry.get_participants("s").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_reset_keeps_old_entry_and_returns_new_name() {
        let provider = Arc::new(MockMediaProvider::new());
        let registry = registry_with(provider.clone());
        registry.create_session("old").await.unwrap();
        registry
            .add_participant("old", participant("Alice", "c1"))
            .await
            .unwrap();

        let new_name = registry.reset_participants("old").await.unwrap().unwrap();

        assert_ne!(new_name, "old");
        assert!(new_name.starts_with("session-"));
        assert!(registry.get_participants(&new_name).await.unwrap().is_empty());
        assert_eq!(registry.get_participants("old").await.unwrap().len(), 1);
        assert_eq!(provider.sessions_created(), 2);
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_old_scheduler_running() {
        let provider = Arc::new(MockMediaProvider::new());
        let registry = registry_with(provider.clone());
        registry.create_session("s").await.unwrap();
        registry.start_scheduler("s").await.unwrap();

        provider.set_fail_create(true);
        let result = registry.reset_participants("s").await;

        assert!(matches!(result, Err(ScError::ProviderUnavailable(_))));
        let info = registry.get_session("s").await.unwrap().unwrap();
        assert_eq!(info.scheduler, SchedulerState::Running);
        assert_eq!(registry.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_session_closed_to_assignment() {
        let provider = Arc::new(MockMediaProvider::new());
        let registry = registry_with(provider.clone());
        let mut completed = registry.subscribe_completed();

        let first = registry
            .assign_participant(participant("Alice", "c1"))
            .await
            .unwrap()
            .session;
        registry.start_scheduler(&first).await.unwrap();

        tokio::time::advance(Duration::from_secs(540)).await;
        assert_eq!(completed.recv().await.unwrap(), first);

        registry.remove_participant(&first, "c1").await.unwrap();
        let second = registry
            .assign_participant(participant("Bob", "c2"))
            .await
            .unwrap();

        assert_ne!(second.session, first);
        assert_eq!(second.roster_len, 1);
        assert_eq!(provider.sessions_created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_suppresses_stale_completion() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));
        let mut completed = registry.subscribe_completed();
        registry.create_session("s").await.unwrap();
        registry.start_scheduler("s").await.unwrap();

        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.start_scheduler("s").await.unwrap();

        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(completed.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(240)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(completed.try_recv().unwrap(), "s");
    }

    #[tokio::test]
    async fn test_start_and_stop_scheduler_state() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));
        registry.create_session("s").await.unwrap();

        let info = registry.get_session("s").await.unwrap().unwrap();
        assert_eq!(info.scheduler, SchedulerState::Idle);

        registry.start_scheduler("s").await.unwrap();
        let info = registry.get_session("s").await.unwrap().unwrap();
        assert_eq!(info.scheduler, SchedulerState::Running);

        assert!(registry.stop_scheduler("s").await.unwrap());
        let info = registry.get_session("s").await.unwrap().unwrap();
        assert_eq!(info.scheduler, SchedulerState::Idle);
        assert!(!registry.stop_scheduler("s").await.unwrap());
    }

    #[tokio::test]
    async fn test_generate_tokens_all_members() {
        let provider = Arc::new(MockMediaProvider::new());
        let registry = registry_with(provider.clone());
        let handle = registry.create_session("s").await.unwrap();
        registry
            .add_participant("s", participant("Alice", "c1"))
            .await
            .unwrap();
        registry
            .add_participant("s", participant("Bob", "c2"))
            .await
            .unwrap();

        let tokens = registry.generate_tokens("s").await;

        assert_eq!(
            tokens,
            vec![
                ParticipantToken {
                    participant: "Alice".to_string(),
                    token: format!("tok_{}_Alice", handle.provider_session_id),
                },
                ParticipantToken {
                    participant: "Bob".to_string(),
                    token: format!("tok_{}_Bob", handle.provider_session_id),
                },
            ]
        );
        assert!(provider
            .requested_capabilities()
            .iter()
            .all(|c| *c == Capability::Publisher));
    }

    #[tokio::test]
    async fn test_generate_tokens_all_or_nothing() {
        let provider = Arc::new(MockMediaProvider::new());
        provider.fail_token_for("Bob");
        let registry = registry_with(provider.clone());
        registry.create_session("s").await.unwrap();
        for (name, conn) in [("Alice", "c1"), ("Bob", "c2"), ("Carol", "c3")] {
            registry
                .add_participant("s", participant(name, conn))
                .await
                .unwrap();
        }

        assert!(registry.generate_tokens("s").await.is_empty());
        assert!(matches!(
            registry.try_generate_tokens("s").await,
            Err(ScError::PartialFailure {
                failed: 1,
                total: 3
            })
        ));
        assert!(registry.generate_tokens("ghost").await.is_empty());
        assert!(matches!(
            registry.try_generate_tokens("ghost").await,
            Err(ScError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_actor() {
        let registry = registry_with(Arc::new(MockMediaProvider::new()));
        assert!(!registry.is_cancelled());

        registry.cancel();
        assert!(registry.is_cancelled());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            registry.list_sessions().await,
            Err(ScError::Internal(_))
        ));
    }
}
