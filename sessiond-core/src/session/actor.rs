//! The per-session lifecycle actor.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::alarm::AlarmQueue;
use crate::clock::Clock;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::notifier::{Notifier, NotifyError};
use crate::registry::ActorId;
use crate::types::{
    EndReason, InitializeResult, OverReason, SessionConfig, SessionState, SessionStatus,
    CLEANUP_GRACE_MS, IDLE_WARNING_GRACE_MS,
};

/// Lifecycle knobs shared by every actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Arm the first alarm at the sooner of the idle and max-duration
    /// deadlines. When off, `initialize` arms only the idle deadline and a
    /// session shorter than its idle window is ended up to `maxIdleTime -
    /// maxDuration` late.
    pub prompt_max_duration: bool,
}

/// Read-only collaborators shared by all actors.
pub struct ActorContext {
    pub db: Arc<Database>,
    pub alarms: Arc<AlarmQueue>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub policy: SessionPolicy,
}

impl ActorContext {
    pub fn new(db: Arc<Database>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            alarms: Arc::new(AlarmQueue::new()),
            notifier,
            clock,
            policy: SessionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// What an actor did with its state and alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing was due; the alarm was re-armed.
    Rescheduled { next_alarm: i64 },
    /// First idle detection; the follow-up alarm is armed.
    IdleWarning { follow_up_at: i64 },
    /// The session ended; a final alarm will erase storage.
    Ended { reason: EndReason, cleanup_at: i64 },
    /// Storage was erased.
    Erased,
    /// The session was already ended, nothing changed.
    Unchanged,
}

/// Lifecycle actor for one session.
///
/// Every public operation runs under the actor's gate, so invocations for one
/// session never interleave. Operations on different sessions share nothing
/// mutable.
pub struct SessionActor {
    id: ActorId,
    ctx: Arc<ActorContext>,
    gate: Mutex<()>,
}

impl SessionActor {
    pub fn new(id: ActorId, ctx: Arc<ActorContext>) -> Self {
        Self {
            id,
            ctx,
            gate: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store fresh state and arm the first alarm.
    ///
    /// Overwrites any existing state for this actor.
    pub async fn initialize(
        &self,
        session_id: &str,
        config: SessionConfig,
    ) -> Result<InitializeResult> {
        let _gate = self.gate.lock().await;

        config.validate()?;

        if let Some(existing) = self.load()? {
            warn!(
                session_id = %session_id,
                previous_status = %existing.status,
                "Re-initializing session, overwriting existing state"
            );
        }

        let now = self.now();
        let state = SessionState::new(session_id, now, config.max_duration, config.max_idle_time);
        let next_idle_check = if self.ctx.policy.prompt_max_duration {
            state.next_deadline()
        } else {
            now + config.max_idle_time
        };

        self.commit(&state, next_idle_check)?;

        info!(
            session_id = %session_id,
            expires_at = state.expires_at,
            next_idle_check,
            "Session initialized"
        );

        Ok(InitializeResult {
            expires_at: state.expires_at,
            next_idle_check,
        })
    }

    /// Record user activity. Leaves the alarm alone; the next firing
    /// observes the fresh timestamp.
    pub async fn update_activity(&self) -> Result<SessionState> {
        let _gate = self.gate.lock().await;

        let mut state = self.require()?;
        if state.status.is_ended() {
            return Err(Error::SessionEnded(state.session_id));
        }

        state.last_activity = state.last_activity.max(self.now());
        if state.status == SessionStatus::IdleWarning {
            state.status = SessionStatus::Active;
            info!(session_id = %state.session_id, "Activity resumed during idle warning");
        }

        self.save(&state)?;
        debug!(session_id = %state.session_id, last_activity = state.last_activity, "Heartbeat");
        Ok(state)
    }

    /// Explicit "keep working" from the control plane: back to active with a
    /// fresh activity timestamp. Does not notify anyone.
    pub async fn extend_session(&self) -> Result<SessionState> {
        let _gate = self.gate.lock().await;

        let mut state = self.require()?;
        if state.status.is_ended() {
            return Err(Error::SessionEnded(state.session_id));
        }

        state.status = SessionStatus::Active;
        state.last_activity = state.last_activity.max(self.now());
        self.save(&state)?;

        info!(session_id = %state.session_id, "Session extended");
        Ok(state)
    }

    /// Tell the control plane the session is over and act on `reason`.
    pub async fn schedule_session_over(&self, reason: OverReason) -> Result<Transition> {
        let _gate = self.gate.lock().await;

        let state = self.require()?;
        if state.status.is_ended() {
            return Ok(Transition::Unchanged);
        }
        self.session_over(state, reason).await
    }

    /// Alarm handler. Decides whether to erase, end, warn or re-arm.
    pub async fn alarm(&self) -> Result<Transition> {
        let _gate = self.gate.lock().await;

        let Some(mut state) = self.load()? else {
            debug!(actor_id = %self.id, "Alarm for actor without state, discarding");
            self.erase()?;
            return Ok(Transition::Erased);
        };

        let now = self.now();

        if state.status.is_ended() {
            debug!(session_id = %state.session_id, "Alarm after end, erasing storage");
            self.erase()?;
            return Ok(Transition::Erased);
        }

        if state.is_expired(now) {
            return self.session_over(state, OverReason::MaxDuration).await;
        }

        if state.status == SessionStatus::IdleWarning {
            if state.idle_for(now) >= state.max_idle_time {
                return self.end_session(state, EndReason::IdleTimeout);
            }
            state.status = SessionStatus::Active;
        }

        if state.idle_for(now) >= state.max_idle_time {
            return self.session_over(state, OverReason::Idle).await;
        }

        let next_alarm = state.next_deadline();
        self.commit(&state, next_alarm)?;
        debug!(session_id = %state.session_id, next_alarm, "Alarm re-armed");

        Ok(Transition::Rescheduled { next_alarm })
    }

    /// Current state, if any. Read-only.
    pub async fn get_state(&self) -> Result<Option<SessionState>> {
        let _gate = self.gate.lock().await;
        self.load()
    }

    /// Force the session to end, then erase all storage. Safe on actors
    /// that were never initialized or are already erased.
    pub async fn cleanup(&self) -> Result<Transition> {
        let _gate = self.gate.lock().await;

        if let Some(state) = self.load()? {
            self.end_session(state, EndReason::Cleanup)?;
        }
        self.erase()?;
        Ok(Transition::Erased)
    }

    /// End an existing session for `reason`, then erase it.
    pub async fn end(&self, reason: EndReason) -> Result<Transition> {
        let _gate = self.gate.lock().await;

        let state = self.require()?;
        self.end_session(state, reason)?;
        self.erase()?;
        Ok(Transition::Erased)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals (caller holds the gate)
    // ─────────────────────────────────────────────────────────────────────────

    async fn session_over(
        &self,
        mut state: SessionState,
        reason: OverReason,
    ) -> Result<Transition> {
        let notified = self
            .ctx
            .notifier
            .schedule_over(&state.session_id, reason, reason.delay_ms())
            .await;

        match notified {
            Ok(()) => {}
            Err(NotifyError::SessionUnknown(_)) => {
                warn!(
                    session_id = %state.session_id,
                    reason = %reason,
                    "Control plane does not know session, ending it"
                );
                return self.end_session(state, EndReason::SessionNotFound);
            }
            Err(NotifyError::Transient(e)) => {
                warn!(
                    session_id = %state.session_id,
                    reason = %reason,
                    error = %e,
                    "Control plane notification failed"
                );
            }
        }

        match reason {
            OverReason::MaxDuration => self.end_session(state, EndReason::MaxDuration),
            OverReason::Idle => {
                let follow_up_at = self.now() + IDLE_WARNING_GRACE_MS;
                state.status = SessionStatus::IdleWarning;
                self.commit(&state, follow_up_at)?;

                info!(session_id = %state.session_id, follow_up_at, "Session idle, warning issued");
                Ok(Transition::IdleWarning { follow_up_at })
            }
        }
    }

    fn end_session(&self, mut state: SessionState, reason: EndReason) -> Result<Transition> {
        if state.status.is_ended() {
            return Ok(Transition::Unchanged);
        }

        let now = self.now();
        let cleanup_at = now + CLEANUP_GRACE_MS;
        state.status = SessionStatus::Ended;
        state.ended_at = Some(now);
        state.end_reason = Some(reason.to_string());
        self.commit(&state, cleanup_at)?;

        info!(session_id = %state.session_id, reason = %reason, cleanup_at, "Session ended");
        Ok(Transition::Ended { reason, cleanup_at })
    }

    fn erase(&self) -> Result<()> {
        self.ctx.db.delete_all(self.id.as_str())?;
        self.ctx.alarms.cancel(self.id.as_str());
        Ok(())
    }

    /// Persist state and its alarm atomically, then arm the queue
    fn commit(&self, state: &SessionState, alarm_at: i64) -> Result<()> {
        self.ctx
            .db
            .put_state_and_alarm(self.id.as_str(), state, alarm_at)?;
        self.ctx.alarms.schedule(self.id.as_str(), alarm_at);
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionState>> {
        self.ctx.db.get_state(self.id.as_str())
    }

    fn require(&self) -> Result<SessionState> {
        self.load()?
            .ok_or_else(|| Error::SessionNotFound(self.id.to_string()))
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        self.ctx.db.put_state(self.id.as_str(), state)
    }

    fn now(&self) -> i64 {
        self.ctx.clock.now_ms()
    }
}
