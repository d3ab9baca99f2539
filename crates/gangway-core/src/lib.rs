//! gangway-core — domain model and adapter ports for the gangway daemon.
//!
//! The daemon projects tasks running under a container scheduler into a
//! local service-registry agent. This crate holds everything both sides
//! share: the normalized service model, the event model the scheduler
//! pushes, the adapter traits the reconciliation engine consumes, the
//! runtime configuration, and the error taxonomy.
//!
//! # Architecture
//!
//! ```text
//! SchedulerAdapter ──┐
//!                    ├── Bridge (gangway-bridge) ── RegistryAdapter
//! AddressResolver ───┘
//! ```
//!
//! Adapters are stateless wrappers around HTTP clients; the engine owns
//! all mutable state. Domain values are immutable once constructed.

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ports::{AddressResolver, EventSink, RegistryAdapter, SchedulerAdapter};
pub use types::{Action, Service, ServiceEvent, ServiceGroup, TaskId};
