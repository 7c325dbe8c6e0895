//! `SessionGateway` - entry point used by transport adapters.
//!
//! Ties assignment, roster bookkeeping, the start flag and the scheduler
//! together:
//!
//! 1. `join` places the participant with the first-fit policy.
//! 2. When the roster reaches the start threshold, `start_session` runs.
//! 3. `start_session` claims the session's flag with an atomic
//!    check-and-set; only the caller that claims it starts the scheduler.
//! 4. `finish_session` stops the scheduler and clears the flag.
//! 5. When a timeline completes, the completion watcher clears the flag and
//!    removes the session once nobody is left in it; otherwise the last
//!    `leave` removes it.

use crate::actors::{SchedulerState, SessionRegistryHandle};
use crate::errors::ScError;
use crate::flags::SessionFlagStore;
use crate::models::{ConnectionHandle, Participant, ParticipantToken};

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Session lifecycle facade over the registry and flag store.
#[derive(Clone)]
pub struct SessionGateway {
    registry: SessionRegistryHandle,
    flags: Arc<dyn SessionFlagStore>,
    start_threshold: usize,
}

impl SessionGateway {
    #[must_use]
    pub fn new(
        registry: SessionRegistryHandle,
        flags: Arc<dyn SessionFlagStore>,
        start_threshold: usize,
    ) -> Self {
        Self {
            registry,
            flags,
            start_threshold,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistryHandle {
        &self.registry
    }

    /// Place a participant in a session and return the session name.
    ///
    /// Starts the session when the roster reaches the start threshold. A
    /// failed start is logged; the participant stays joined either way.
    #[instrument(skip_all, name = "sc.gateway.join", fields(connection_id = %connection.connection_id()))]
    pub async fn join(
        &self,
        display_name: &str,
        connection: ConnectionHandle,
    ) -> Result<String, ScError> {
        let assignment = self
            .registry
            .assign_participant(Participant::new(display_name, connection))
            .await?;

        info!(
            target: "sc.gateway",
            session = %assignment.session,
            roster_len = assignment.roster_len,
            "Participant joined"
        );

        if assignment.roster_len >= self.start_threshold {
            match self.start_session(&assignment.session).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(
                        target: "sc.gateway",
                        session = %assignment.session,
                        "Session already started"
                    );
                }
                Err(e) => {
                    warn!(
                        target: "sc.gateway",
                        session = %assignment.session,
                        error = %e,
                        "Failed to start session"
                    );
                }
            }
        }

        Ok(assignment.session)
    }

    /// Remove the participant with `connection_id` from `session`.
    pub async fn leave(&self, session: &str, connection_id: &str) -> Result<bool, ScError> {
        let removed = self
            .registry
            .remove_participant(session, connection_id)
            .await?;

        if removed {
            info!(
                target: "sc.gateway",
                session = %session,
                connection_id = %connection_id,
                "Participant left"
            );

            if let Some(info) = self.registry.get_session(session).await? {
                if info.scheduler == SchedulerState::Completed && info.participant_count == 0 {
                    self.close_session(session).await?;
                }
            }
        }
        Ok(removed)
    }

    /// Retire sessions as their timelines complete, until `cancel_token`
    /// fires.
    ///
    /// Subscribes before returning, so completions after this call are not
    /// missed.
    #[must_use]
    pub fn spawn_completion_watcher(&self, cancel_token: CancellationToken) -> JoinHandle<()> {
        let mut completed = self.registry.subscribe_completed();
        let gateway = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => break,

                    next = completed.recv() => match next {
                        Ok(session) => {
                            if let Err(e) = gateway.retire_session(&session).await {
                                warn!(
                                    target: "sc.gateway",
                                    session = %session,
                                    error = %e,
                                    "Failed to retire completed session"
                                );
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "sc.gateway",
                                skipped,
                                "Completion watcher lagged"
                            );
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!(target: "sc.gateway", "Completion watcher stopped");
        })
    }

    /// Clear the start flag of a completed session and remove the session
    /// if its roster is empty.
    #[instrument(skip_all, name = "sc.gateway.retire_session", fields(session = %session))]
    pub async fn retire_session(&self, session: &str) -> Result<(), ScError> {
        self.flags.delete(session).await?;

        let empty = self
            .registry
            .get_session(session)
            .await?
            .is_some_and(|info| info.participant_count == 0);
        if empty {
            self.registry.delete_session(session).await?;
        }

        info!(
            target: "sc.gateway",
            session = %session,
            removed = empty,
            "Completed session retired"
        );
        Ok(())
    }

    /// Start the session's scheduler unless it was already started.
    ///
    /// Returns `true` if this call started it.
    ///
    /// # Errors
    ///
    /// - `ScError::FlagStore` if the flag could not be read or written
    /// - `ScError::NotFound` if the session is unknown (the flag is released)
    #[instrument(skip_all, name = "sc.gateway.start_session", fields(session = %session))]
    pub async fn start_session(&self, session: &str) -> Result<bool, ScError> {
        if !self.flags.try_set(session).await? {
            return Ok(false);
        }

        if let Err(e) = self.registry.start_scheduler(session).await {
            // Release the flag so a later trigger can retry.
            if let Err(release_err) = self.flags.delete(session).await {
                warn!(
                    target: "sc.gateway",
                    session = %session,
                    error = %release_err,
                    "Failed to release start flag"
                );
            }
            return Err(e);
        }

        info!(target: "sc.gateway", session = %session, "Session started");
        Ok(true)
    }

    /// Like [`Self::start_session`] but reports a lost race as an error.
    pub async fn start_session_exclusive(&self, session: &str) -> Result<(), ScError> {
        if self.start_session(session).await? {
            Ok(())
        } else {
            Err(ScError::AlreadyStarted(session.to_string()))
        }
    }

    /// Stop the scheduler and clear the start flag.
    #[instrument(skip_all, name = "sc.gateway.finish_session", fields(session = %session))]
    pub async fn finish_session(&self, session: &str) -> Result<(), ScError> {
        let stopped = self.registry.stop_scheduler(session).await?;
        self.flags.delete(session).await?;

        info!(
            target: "sc.gateway",
            session = %session,
            scheduler_stopped = stopped,
            "Session finished"
        );
        Ok(())
    }

    /// Finish the session and drop it from the registry.
    pub async fn close_session(&self, session: &str) -> Result<bool, ScError> {
        self.finish_session(session).await?;
        self.registry.delete_session(session).await
    }

    /// Whether the session's start flag is set.
    pub async fn is_started(&self, session: &str) -> Result<bool, ScError> {
        Ok(self.flags.get(session).await?.unwrap_or(false))
    }

    /// Media tokens for every roster member; empty on any failure.
    pub async fn tokens(&self, session: &str) -> Vec<ParticipantToken> {
        self.registry.generate_tokens(session).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::{RegistryConfig, SchedulerState};
    use crate::broadcast::mock::RecordingBroadcaster;
    use crate::flags::InMemoryFlagStore;
    use crate::provider::mock::MockMediaProvider;

    fn gateway(threshold: usize) -> (SessionGateway, Arc<InMemoryFlagStore>) {
        let flags = Arc::new(InMemoryFlagStore::new());
        let registry = SessionRegistryHandle::new(
            "sc-test".to_string(),
            RegistryConfig::default(),
            Arc::new(MockMediaProvider::new()),
            Arc::new(RecordingBroadcaster::new()),
        );
        (
            SessionGateway::new(registry, flags.clone(), threshold),
            flags,
        )
    }

    fn connection(id: &str) -> ConnectionHandle {
        ConnectionHandle::new(id, 8).0
    }

    #[tokio::test]
    async fn test_start_session_only_once() {
        let (gateway, flags) = gateway(6);
        gateway
            .registry()
            .create_session("s")
            .await
            .unwrap();

        assert!(gateway.start_session("s").await.unwrap());
        assert!(!gateway.start_session("s").await.unwrap());
        assert!(matches!(
            gateway.start_session_exclusive("s").await,
            Err(ScError::AlreadyStarted(_))
        ));
        assert_eq!(flags.get("s").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_start_unknown_session_releases_flag() {
        let (gateway, flags) = gateway(6);

        let result = gateway.start_session("ghost").await;
        assert!(matches!(result, Err(ScError::NotFound(_))));
        assert_eq!(flags.get("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_join_auto_starts_at_threshold() {
        let (gateway, _flags) = gateway(2);

        let first = gateway.join("Alice", connection("c1")).await.unwrap();
        assert!(!gateway.is_started(&first).await.unwrap());

        let second = gateway.join("Bob", connection("c2")).await.unwrap();
        assert_eq!(first, second);
        assert!(gateway.is_started(&first).await.unwrap());

        let info = gateway
            .registry()
            .get_session(&first)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.scheduler, SchedulerState::Running);
    }

    #[tokio::test]
    async fn test_finish_session_clears_flag() {
        let (gateway, flags) = gateway(1);
        let session = gateway.join("Alice", connection("c1")).await.unwrap();
        assert_eq!(flags.get(&session).await.unwrap(), Some(true));

        gateway.finish_session(&session).await.unwrap();

        assert_eq!(flags.get(&session).await.unwrap(), None);
        let info = gateway
            .registry()
            .get_session(&session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.scheduler, SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_clears_flag_and_last_leave_removes_session() {
        let (gateway, flags) = gateway(1);
        let watcher = gateway.spawn_completion_watcher(CancellationToken::new());

        let session = gateway.join("Alice", connection("c1")).await.unwrap();
        tokio::time::advance(std::time::Duration::from_secs(540)).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(flags.get(&session).await.unwrap(), None);
        let info = gateway
            .registry()
            .get_session(&session)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.scheduler, SchedulerState::Completed);

        assert!(gateway.leave(&session, "c1").await.unwrap());
        assert!(gateway
            .registry()
            .get_session(&session)
            .await
            .unwrap()
            .is_none());
        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_removes_empty_session() {
        let (gateway, flags) = gateway(1);
        let token = CancellationToken::new();
        let watcher = gateway.spawn_completion_watcher(token.clone());

        let session = gateway.join("Alice", connection("c1")).await.unwrap();
        gateway.leave(&session, "c1").await.unwrap();

        tokio::time::advance(std::time::Duration::from_secs(540)).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(flags.get(&session).await.unwrap(), None);
        assert!(gateway.registry().list_sessions().await.unwrap().is_empty());

        token.cancel();
        watcher.await.unwrap();
    }

    #[tokio::test]
    async fn test_leave_and_close() {
        let (gateway, _flags) = gateway(6);
        let session = gateway.join("Alice", connection("c1")).await.unwrap();

        assert!(gateway.leave(&session, "c1").await.unwrap());
        assert!(!gateway.leave(&session, "c1").await.unwrap());

        assert!(gateway.close_session(&session).await.unwrap());
        assert!(gateway
            .registry()
            .get_session(&session)
            .await
            .unwrap()
            .is_none());
    }
}
