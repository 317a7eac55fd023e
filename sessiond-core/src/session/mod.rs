//! Session lifecycle actor.
//!
//! One actor owns the canonical state of one session and enforces its
//! deadlines through a self-rescheduled alarm, even when no requests arrive.
//!
//! ## State Machine
//!
//! ```text
//! active ──(idle timeout)──► idle-warning ──(still idle after 15s)──► ended
//!   ▲                             │
//!   └──────(activity resumes)─────┘
//!
//! active | idle-warning ──(max duration)──────────────► ended
//! any non-ended ──(control plane: unknown session)────► ended
//! ended ──(cleanup, or 5 min later)───────────────────► [storage erased]
//! ```
//!
//! ## Alarm Evaluation Order
//!
//! 1. `ended`: stray or cleanup alarm, erase storage
//! 2. past `expiresAt`: max-duration, always preempts idle handling
//! 3. `idle-warning`: follow-up, end if still idle, else resume
//! 4. idle for `maxIdleTime`: first idle detection, warn
//! 5. otherwise re-arm at the sooner of both deadlines

mod actor;

pub use actor::*;
