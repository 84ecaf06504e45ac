//! Durable state and event history
//!
//! Two files back the watcher across restarts: a JSON snapshot of per-game
//! tracking state (for recovery) and an append-only JSONL log of lifecycle
//! events (for audit).

pub mod event_log;
pub mod state_store;

pub use event_log::{EventKind, EventLog, EventLogEntry};
pub use state_store::{GamePhase, GameStateStore, TrackedGame};
