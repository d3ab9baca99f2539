//! gangway-consul — the registry side of the bridge.
//!
//! Implements [`gangway_core::RegistryAdapter`] against a Consul-style
//! local agent: reading the agent's flat service set, registering and
//! deregistering service groups, extracting the agent's advertise
//! address (the engine's locality filter), and a leader-status ping for
//! startup readiness.
//!
//! In dry-run mode the mutating calls log their intent and skip HTTP.

pub mod adapter;
pub mod model;

pub use adapter::ConsulAdapter;
