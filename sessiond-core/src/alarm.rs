//! Deadline-ordered alarm queue.
//!
//! Every actor has at most one pending alarm. Alarms live in a min-heap of
//! `(deadline, generation, actor_id)`; rescheduling an actor pushes a new
//! entry with a fresh generation and the old entry is discarded when it
//! surfaces. One background task sleeps until the earliest deadline and
//! hands due actor ids to an [`AlarmSink`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::clock::Clock;

/// Receiver of fired alarms. Must not block.
pub trait AlarmSink: Send + Sync {
    fn deliver(&self, actor_id: String);
}

#[derive(Default)]
struct AlarmHeap {
    heap: BinaryHeap<Reverse<(i64, u64, String)>>,
    /// actor_id -> (deadline, generation) of its live entry
    current: HashMap<String, (i64, u64)>,
    next_generation: u64,
}

impl AlarmHeap {
    fn is_live(&self, deadline: i64, generation: u64, actor_id: &str) -> bool {
        self.current.get(actor_id) == Some(&(deadline, generation))
    }

    /// Drop stale entries sitting at the top of the heap
    fn discard_stale(&mut self) {
        while let Some(Reverse((deadline, generation, actor_id))) = self.heap.peek() {
            if self.is_live(*deadline, *generation, actor_id) {
                break;
            }
            self.heap.pop();
        }
    }
}

/// Queue of pending actor alarms
#[derive(Default)]
pub struct AlarmQueue {
    inner: Mutex<AlarmHeap>,
    wake: Notify,
}

impl AlarmQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn heap(&self) -> std::sync::MutexGuard<'_, AlarmHeap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the actor's alarm to `deadline`, replacing any pending one
    pub fn schedule(&self, actor_id: &str, deadline: i64) {
        {
            let mut heap = self.heap();
            let generation = heap.next_generation;
            heap.next_generation += 1;
            heap.current
                .insert(actor_id.to_string(), (deadline, generation));
            heap.heap
                .push(Reverse((deadline, generation, actor_id.to_string())));
        }
        trace!(actor_id = %actor_id, deadline, "Alarm scheduled");
        self.wake.notify_one();
    }

    /// Drop the actor's pending alarm, if any
    pub fn cancel(&self, actor_id: &str) {
        self.heap().current.remove(actor_id);
    }

    /// Pending deadline for one actor
    pub fn pending(&self, actor_id: &str) -> Option<i64> {
        self.heap().current.get(actor_id).map(|(deadline, _)| *deadline)
    }

    /// Number of actors with a pending alarm
    pub fn len(&self) -> usize {
        self.heap().current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest live deadline
    pub fn next_deadline(&self) -> Option<i64> {
        let mut heap = self.heap();
        heap.discard_stale();
        let next = heap.heap.peek().map(|Reverse((deadline, _, _))| *deadline);
        next
    }

    /// Remove and return every actor whose alarm is due at `now`, earliest first
    pub fn pop_due(&self, now: i64) -> Vec<String> {
        let mut heap = self.heap();
        let mut due = Vec::new();

        loop {
            heap.discard_stale();
            match heap.heap.peek() {
                Some(Reverse((deadline, _, _))) if *deadline <= now => {}
                _ => break,
            }
            if let Some(Reverse((_, _, actor_id))) = heap.heap.pop() {
                heap.current.remove(&actor_id);
                due.push(actor_id);
            }
        }

        due
    }

    /// Service the queue until the task is aborted.
    pub async fn run(self: Arc<Self>, clock: Arc<dyn Clock>, sink: Arc<dyn AlarmSink>) {
        debug!("Alarm loop started");
        loop {
            for actor_id in self.pop_due(clock.now_ms()) {
                debug!(actor_id = %actor_id, "Alarm fired");
                sink.deliver(actor_id);
            }

            match self.next_deadline() {
                Some(deadline) => {
                    let wait = (deadline - clock.now_ms()).max(0) as u64;
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
                        _ = self.wake.notified() => {}
                    }
                }
                None => self.wake.notified().await,
            }
        }
    }
}
