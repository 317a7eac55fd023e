//! Session lifecycle types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle constants (milliseconds)
// ─────────────────────────────────────────────────────────────────────────────

/// Default absolute cap on a session's lifetime (30 minutes).
pub const DEFAULT_MAX_DURATION_MS: i64 = 30 * 60 * 1000;

/// Default inactivity window before the idle warning (5 minutes).
pub const DEFAULT_MAX_IDLE_TIME_MS: i64 = 5 * 60 * 1000;

/// Grace window between the idle warning and the idle shutdown.
pub const IDLE_WARNING_GRACE_MS: i64 = 15 * 1000;

/// Delay between a session ending and its storage being erased.
pub const CLEANUP_GRACE_MS: i64 = 5 * 60 * 1000;

/// Largest `maxDuration` or `maxIdleTime` a caller may request (365 days).
pub const MAX_CONFIGURABLE_DURATION_MS: i64 = 365 * 24 * 60 * 60 * 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Active,
    IdleWarning,
    /// Reserved. Nothing currently transitions into it.
    Ending,
    /// Terminal. Nothing is reachable from here except storage erasure.
    Ended,
    /// Reserved. Nothing currently transitions into it.
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::IdleWarning => "idle-warning",
            Self::Ending => "ending",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reasons
// ─────────────────────────────────────────────────────────────────────────────

/// Which deadline was crossed when a session is scheduled to be over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverReason {
    Idle,
    MaxDuration,
}

impl OverReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MaxDuration => "max-duration",
        }
    }

    /// Grace the control plane is told to expect before the session ends.
    pub fn delay_ms(&self) -> i64 {
        match self {
            Self::Idle => IDLE_WARNING_GRACE_MS,
            Self::MaxDuration => 0,
        }
    }
}

impl fmt::Display for OverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    IdleTimeout,
    MaxDuration,
    /// The control plane confirmed it does not know the session.
    SessionNotFound,
    Cleanup,
    /// Free-form reason supplied by an explicit end request.
    Requested(String),
}

impl EndReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::IdleTimeout => "idle-timeout",
            Self::MaxDuration => "max-duration",
            Self::SessionNotFound => "session-not-found",
            Self::Cleanup => "cleanup",
            Self::Requested(reason) => reason,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical lifecycle state of one session, owned by exactly one actor.
///
/// All instants are epoch milliseconds, all durations milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub created_at: i64,
    pub last_activity: i64,
    /// `created_at + max_duration`, fixed at creation.
    pub expires_at: i64,
    pub max_duration: i64,
    pub max_idle_time: i64,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<String>,
}

impl SessionState {
    /// Fresh active state created at `now`.
    pub fn new(session_id: impl Into<String>, now: i64, max_duration: i64, max_idle_time: i64) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_activity: now,
            expires_at: now.saturating_add(max_duration),
            max_duration,
            max_idle_time,
            status: SessionStatus::Active,
            ended_at: None,
            end_reason: None,
        }
    }

    /// Milliseconds since the last recorded activity.
    pub fn idle_for(&self, now: i64) -> i64 {
        now - self.last_activity
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Next instant the idle deadline or the max-duration deadline is due,
    /// whichever comes first.
    pub fn next_deadline(&self) -> i64 {
        self.last_activity
            .saturating_add(self.max_idle_time)
            .min(self.expires_at)
    }
}

/// Outcome of initializing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub expires_at: i64,
    pub next_idle_check: i64,
}

/// Durations a session is initialized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub max_duration: i64,
    pub max_idle_time: i64,
}

impl SessionConfig {
    /// Both durations must be positive and at most
    /// [`MAX_CONFIGURABLE_DURATION_MS`].
    pub fn validate(&self) -> Result<()> {
        let in_range = |ms: i64| ms > 0 && ms <= MAX_CONFIGURABLE_DURATION_MS;
        if in_range(self.max_duration) && in_range(self.max_idle_time) {
            return Ok(());
        }
        Err(Error::InvalidConfig(format!(
            "durations must be between 1 and {} ms (maxDuration={}, maxIdleTime={})",
            MAX_CONFIGURABLE_DURATION_MS, self.max_duration, self.max_idle_time
        )))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_DURATION_MS,
            max_idle_time: DEFAULT_MAX_IDLE_TIME_MS,
        }
    }
}
