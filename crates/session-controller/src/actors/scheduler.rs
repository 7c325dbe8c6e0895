//! `PhaseScheduler` - per-session timed phase driver.
//!
//! One scheduler task runs per started session. On every tick it advances a
//! [`PhaseTimer`]; when a phase becomes due it reads the current roster,
//! resolves the phase content and hands one event per participant to the
//! [`Broadcaster`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──▶ Running ──last phase──▶ Completed
//!                    │
//!                    └──cancel──▶ Stopped
//! ```
//!
//! Cancellation is checked before every tick, so a scheduler stopped before
//! an offset never fires that phase.

use crate::broadcast::{deliver_phase, Broadcaster};
use crate::models::Participant;
use crate::observability::metrics;
use crate::phases::{Phase, PhaseEvent, PhaseTimer, Timeline};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Smallest accepted tick interval.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No scheduler has been started for the session.
    Idle,
    /// Ticking; some phases still pending.
    Running,
    /// Every phase fired.
    Completed,
    /// Cancelled before completion.
    Stopped,
}

impl SchedulerState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Completed => "completed",
            SchedulerState::Stopped => "stopped",
        }
    }
}

/// The scheduler's view of its owner: roster reads at each phase boundary
/// and the completion report.
#[async_trait::async_trait]
pub trait SchedulerHost: Send + Sync {
    /// Current roster of `session`; empty if the session is unknown.
    async fn roster(&self, session: &str) -> Vec<Participant>;

    /// Called once after the last phase fired. Not called on cancellation.
    async fn timeline_completed(&self, _session: &str) {}
}

/// Handle to a running (or finished) scheduler task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PhaseSchedulerHandle {
    session_name: String,
    cancel_token: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    task_handle: JoinHandle<()>,
}

impl PhaseSchedulerHandle {
    #[must_use]
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Cancel the tick source. Pending phases never fire.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        let state = *self.state.borrow();
        if state == SchedulerState::Running && self.cancel_token.is_cancelled() {
            // Cancelled but the task has not observed it yet.
            return SchedulerState::Stopped;
        }
        state
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }

    /// Wait until the scheduler leaves `Running`.
    pub async fn wait_finished(&mut self) -> SchedulerState {
        match self
            .state
            .wait_for(|state| *state != SchedulerState::Running)
            .await
        {
            Ok(state) => *state,
            // Sender dropped without a terminal state: the task panicked or was aborted.
            Err(_) => SchedulerState::Stopped,
        }
    }
}

impl Drop for PhaseSchedulerHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// The scheduler task state.
pub struct PhaseScheduler {
    session_name: String,
    timer: PhaseTimer,
    tick_interval: Duration,
    host: Arc<dyn SchedulerHost>,
    broadcaster: Arc<dyn Broadcaster>,
    cancel_token: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl PhaseScheduler {
    /// Spawn a scheduler task for `session_name`.
    ///
    /// The first tick happens one `tick_interval` after this call.
    #[must_use]
    pub fn spawn(
        session_name: String,
        timeline: Timeline,
        tick_interval: Duration,
        host: Arc<dyn SchedulerHost>,
        broadcaster: Arc<dyn Broadcaster>,
        cancel_token: CancellationToken,
    ) -> PhaseSchedulerHandle {
        let tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);
        let first_tick = Instant::now() + tick_interval;

        let scheduler = Self {
            session_name: session_name.clone(),
            timer: PhaseTimer::new(timeline),
            tick_interval,
            host,
            broadcaster,
            cancel_token: cancel_token.clone(),
            state: state_tx,
        };

        metrics::scheduler_started();
        let task_handle = tokio::spawn(scheduler.run(first_tick));

        PhaseSchedulerHandle {
            session_name,
            cancel_token,
            state: state_rx,
            task_handle,
        }
    }

    #[instrument(skip_all, name = "sc.actor.scheduler", fields(session = %self.session_name))]
    async fn run(mut self, first_tick: Instant) {
        info!(
            target: "sc.actor.scheduler",
            session = %self.session_name,
            tick_ms = u64::try_from(self.tick_interval.as_millis()).unwrap_or(u64::MAX),
            "Phase scheduler started"
        );

        let mut ticker = tokio::time::interval_at(first_tick, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let final_state = loop {
            if self.timer.is_finished() {
                break SchedulerState::Completed;
            }

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sc.actor.scheduler",
                        session = %self.session_name,
                        elapsed = self.timer.elapsed(),
                        phases_fired = self.timer.cursor(),
                        "Phase scheduler cancelled"
                    );
                    break SchedulerState::Stopped;
                }

                _ = ticker.tick() => {
                    if let Some(phase) = self.timer.tick() {
                        self.fire(phase).await;
                    }
                }
            }
        };

        if final_state == SchedulerState::Completed {
            info!(
                target: "sc.actor.scheduler",
                session = %self.session_name,
                elapsed = self.timer.elapsed(),
                "Phase scheduler completed"
            );
        }

        self.state.send_replace(final_state);
        metrics::scheduler_stopped();

        // Reported after the state flips so the host observes `Completed`.
        if final_state == SchedulerState::Completed {
            self.host.timeline_completed(&self.session_name).await;
        }
    }

    /// Resolve and broadcast one phase to the current roster.
    async fn fire(&self, phase: Phase) {
        let roster = self.host.roster(&self.session_name).await;

        let event = {
            let mut rng = rand::thread_rng();
            PhaseEvent::resolve(phase, &roster, &mut rng)
        };

        if let PhaseEvent::Keyword { second: None, .. } = &event {
            warn!(
                target: "sc.actor.scheduler",
                session = %self.session_name,
                roster_size = roster.len(),
                "Keyword phase fired without a second participant"
            );
        }

        if roster.is_empty() {
            debug!(
                target: "sc.actor.scheduler",
                session = %self.session_name,
                phase = phase.name(),
                "Phase fired with empty roster"
            );
        }

        let report = deliver_phase(self.broadcaster.as_ref(), &roster, &event).await;
        metrics::record_phase_fired(phase.name());

        info!(
            target: "sc.actor.scheduler",
            session = %self.session_name,
            phase = phase.name(),
            elapsed = self.timer.elapsed(),
            delivered = report.delivered,
            failed = report.failed,
            "Phase fired"
        );
    }
}
