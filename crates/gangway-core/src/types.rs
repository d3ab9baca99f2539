//! Normalized domain types shared by the scheduler and registry sides.
//!
//! A scheduler task maps to one [`ServiceGroup`]; each port the task
//! exposes maps to one [`Service`] inside it. The registry holds flat
//! per-service entries, so both sides are compared through the composite
//! [`Service::service_key`].

use serde::{Deserialize, Serialize};

/// Unique identifier of a scheduler task.
pub type TaskId = String;

/// One registry entry: a (name, address, port) tuple plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Unique within a node; canonical form is `<task-id>:<original-port>`.
    pub id: String,
    /// Resolved service name. Defaults to the last path segment of the
    /// application ID, suffixed `-<original-port>` for multi-port tasks,
    /// overridable through `SERVICE_*` metadata.
    pub name: String,
    pub tags: Vec<String>,
    /// True iff the task has no health checks defined, or every defined
    /// check has reported alive.
    pub healthy: bool,
    /// The container-internal port the service speaks on.
    pub original_port: u16,
    /// The host port the scheduler mapped it to; this is what the
    /// registry advertises.
    pub exposed_port: u16,
}

impl Service {
    /// Composite key used to diff the scheduler and registry sides.
    ///
    /// Includes the name because the same (ip, port) can legitimately
    /// carry a different logical name after a rename; the rename then
    /// shows up as a deregister/register pair.
    pub fn service_key(&self, ip: &str) -> String {
        format!("{}:{}:{}", self.name, ip, self.exposed_port)
    }
}

/// All services a single task exposes, at a resolved host address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroup {
    /// The owning task's ID.
    pub id: TaskId,
    /// Resolved host IP (not hostname) of the task.
    pub ip: String,
    /// One entry per exposed port, in port order.
    pub services: Vec<Service>,
}

impl ServiceGroup {
    /// A copy of this group narrowed to a single member service.
    ///
    /// Register/deregister operate on groups; diffing operates on
    /// individual services, so convergence calls pass singleton groups.
    pub fn singleton(&self, service: &Service) -> ServiceGroup {
        ServiceGroup {
            id: self.id.clone(),
            ip: self.ip.clone(),
            services: vec![service.clone()],
        }
    }
}

/// What a scheduler notification means for the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Event is irrelevant to registration state.
    Unchanged,
    /// A new task entered the running state; the cache is stale.
    Started,
    /// A task reached a terminal state.
    Stopped,
    /// A task's health became alive.
    WentUp,
    /// A task's health became not alive.
    WentDown,
}

/// One translated scheduler notification.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    /// Affected task ID; may be empty for events the engine ignores.
    pub service_id: TaskId,
    /// Resolved IP of the affected task's host; empty when resolution
    /// failed or the event does not carry a host.
    pub ip: String,
    pub action: Action,
    /// Raw payload, carried for logging only.
    pub original_event: serde_json::Value,
}

impl ServiceEvent {
    /// An event the engine will filter out.
    pub fn unchanged(original_event: serde_json::Value) -> Self {
        ServiceEvent {
            service_id: String::new(),
            ip: String::new(),
            action: Action::Unchanged,
            original_event,
        }
    }
}
