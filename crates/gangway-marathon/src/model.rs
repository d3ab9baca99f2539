//! Wire model for the Marathon REST API.
//!
//! Deserialization is tolerant by design: unknown fields are ignored and
//! collections the API reports as `null` decode as empty.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// `null` collections come back from the API for apps that never had the
/// corresponding feature configured; decode them as their default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response envelope of `GET /v2/apps`.
#[derive(Debug, Clone, Deserialize)]
pub struct Applications {
    #[serde(default)]
    pub apps: Vec<Application>,
}

/// A logical service definition, composed of one or more tasks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub id: String,
    /// Service ports; the original ports when no Docker mapping exists.
    #[serde(default, deserialize_with = "null_default")]
    pub ports: Vec<u16>,
    #[serde(default, deserialize_with = "null_default")]
    pub env: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_default")]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub container: Option<Container>,
    #[serde(default, deserialize_with = "null_default")]
    pub health_checks: Vec<HealthCheck>,
    #[serde(default, deserialize_with = "null_default")]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub docker: Option<Docker>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docker {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub port_mappings: Option<Vec<PortMapping>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: u16,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Only the check's existence matters for health aggregation; the probe
/// details stay with the scheduler.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub grace_period_seconds: Option<u32>,
    #[serde(default)]
    pub interval_seconds: Option<u32>,
}

/// A single running instance of an application on some host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub host: String,
    /// Host ports the scheduler mapped, in mapping order.
    #[serde(default, deserialize_with = "null_default")]
    pub ports: Vec<u16>,
    #[serde(default, deserialize_with = "null_default")]
    pub health_check_results: Vec<HealthCheckResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    #[serde(default)]
    pub alive: bool,
}

/// Payload of a `status_update_event`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateEvent {
    #[serde(alias = "taskID")]
    pub task_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub task_status: String,
}

/// Payload of a `health_status_changed_event`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusChangedEvent {
    #[serde(alias = "taskID")]
    pub task_id: String,
    #[serde(default)]
    pub alive: bool,
}
