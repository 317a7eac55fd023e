//! Database row types for sessiond-core.

use serde::{Deserialize, Serialize};

/// A persisted pending alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlarm {
    pub actor_id: String,
    pub fire_at: i64,
}

/// Stored sessions by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounts {
    pub active: u32,
    pub idle_warning: u32,
    pub ended: u32,
    pub other: u32,
}
