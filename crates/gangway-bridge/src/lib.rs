//! gangway-bridge — the reconciliation engine and its supervisor.
//!
//! The [`Bridge`] owns the daemon's only mutable state: the task cache
//! and the registry's advertise address, both guarded by one engine
//! mutex. It converges the registry onto the scheduler in two ways:
//!
//! - full sync: diff both sides by service key, register what is local,
//!   healthy, and missing; deregister what is dangling
//! - event processing: apply translated scheduler events one at a time,
//!   with the periodic resync as the eventual-consistency safety net
//!
//! The [`Supervisor`] drives it: initial-sync retry, the resync ticker,
//! and the event-loop reconnect policy.

pub mod bridge;
pub mod supervisor;

pub use bridge::{Bridge, SyncStats, EVENT_CHANNEL_CAPACITY};
pub use supervisor::Supervisor;
