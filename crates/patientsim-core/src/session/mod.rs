//! Session store: in-memory, sliding-window idle expiry, no persistence.
//!
//! Each entry maps a [`SessionId`](crate::types::SessionId) to a
//! [`Transcript`](crate::types::Transcript). An entry survives only while it
//! is read or written at least once per idle window.

pub mod clock;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{
    spawn_sweeper, MemorySessionStore, SessionStore, SessionStoreConfig, SessionSummary,
};
