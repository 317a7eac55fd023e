//! sessiond-core - Core library for sessiond
//!
//! This crate implements the lifecycle of bounded, idle-detecting agent work
//! sessions:
//!
//! - **types**: Session state, statuses and lifecycle constants
//! - **db**: Durable per-actor storage (SQLite)
//! - **clock**: Wall-clock abstraction
//! - **alarm**: Deadline-ordered alarm queue, one pending alarm per actor
//! - **notifier**: Control-plane "session over" callback
//! - **session**: The per-session lifecycle actor
//! - **registry**: Actor namespace keyed by a deterministic actor id

pub mod alarm;
pub mod clock;
pub mod db;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use registry::{ActorId, SessionRegistry};
pub use session::SessionActor;
pub use types::*;
