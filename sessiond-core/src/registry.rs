//! Actor namespace.
//!
//! Maps a session id to a deterministic [`ActorId`] and that id to the one
//! live [`SessionActor`] serving it. Alarms fired by the queue are routed
//! back here and run on their own task.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::alarm::AlarmSink;
use crate::error::Result;
use crate::session::{ActorContext, SessionActor, Transition};

/// Namespace prefix mixed into every actor id
const ACTOR_NAMESPACE: &str = "agent-session:";

/// Delay before retrying an alarm whose handler failed (ms)
pub const ALARM_RETRY_MS: i64 = 5_000;

/// Deterministic identity of the actor serving one session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(String);

impl ActorId {
    /// Derive the actor id for a session id. Same name, same actor.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ACTOR_NAMESPACE.as_bytes());
        hasher.update(name.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an id that was already derived, e.g. one read back from storage
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live session actors
#[derive(Clone)]
pub struct SessionRegistry {
    ctx: Arc<ActorContext>,
    actors: Arc<RwLock<HashMap<ActorId, Arc<SessionActor>>>>,
}

impl SessionRegistry {
    pub fn new(ctx: ActorContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            actors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }

    /// Actor id for a session id
    pub fn id_from_name(&self, session_id: &str) -> ActorId {
        ActorId::from_name(session_id)
    }

    /// The actor for `id`, created on first use
    pub async fn get(&self, id: &ActorId) -> Arc<SessionActor> {
        if let Some(actor) = self.actors.read().await.get(id) {
            return Arc::clone(actor);
        }

        let mut actors = self.actors.write().await;
        Arc::clone(
            actors
                .entry(id.clone())
                .or_insert_with(|| Arc::new(SessionActor::new(id.clone(), Arc::clone(&self.ctx)))),
        )
    }

    /// Number of actors held in memory
    pub async fn live_actors(&self) -> usize {
        self.actors.read().await.len()
    }

    /// Forget an actor once nobody else holds it. Its storage must already be
    /// erased; a later request simply recreates it.
    pub async fn evict_if_idle(&self, id: &ActorId) -> bool {
        let mut actors = self.actors.write().await;
        let idle = actors
            .get(id)
            .is_some_and(|actor| Arc::strong_count(actor) == 1);
        if idle {
            actors.remove(id);
            debug!(actor_id = %id, "Evicted actor");
        }
        idle
    }

    /// Run the actor's alarm handler. Failures re-arm a retry alarm so the
    /// actor keeps being driven.
    pub async fn fire_alarm(&self, id: ActorId) {
        let actor = self.get(&id).await;
        let outcome = actor.alarm().await;
        drop(actor);

        match outcome {
            Ok(Transition::Erased) => {
                self.evict_if_idle(&id).await;
            }
            Ok(transition) => {
                debug!(actor_id = %id, ?transition, "Alarm handled");
            }
            Err(e) => {
                let retry_at = self.ctx.clock.now_ms() + ALARM_RETRY_MS;
                error!(actor_id = %id, error = %e, retry_at, "Alarm handler failed, retrying");
                self.ctx.alarms.schedule(id.as_str(), retry_at);
            }
        }
    }

    /// Re-arm every alarm persisted by a previous run. Overdue alarms fire
    /// as soon as the loop starts.
    pub fn recover(&self) -> Result<usize> {
        let alarms = self.ctx.db.list_alarms()?;
        for alarm in &alarms {
            self.ctx.alarms.schedule(&alarm.actor_id, alarm.fire_at);
        }
        info!(count = alarms.len(), "Recovered persisted alarms");
        Ok(alarms.len())
    }

    /// Start the background task servicing the alarm queue
    pub fn spawn_alarm_loop(&self) -> JoinHandle<()> {
        let queue = Arc::clone(&self.ctx.alarms);
        let clock = Arc::clone(&self.ctx.clock);
        let sink: Arc<dyn AlarmSink> = Arc::new(self.clone());
        tokio::spawn(queue.run(clock, sink))
    }
}

impl AlarmSink for SessionRegistry {
    fn deliver(&self, actor_id: String) {
        let registry = self.clone();
        tokio::spawn(async move {
            registry.fire_alarm(ActorId::from_raw(actor_id)).await;
        });
    }
}
