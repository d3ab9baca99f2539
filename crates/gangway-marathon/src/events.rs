//! Scheduler event classification and translation.
//!
//! The stream carries many event classes; only task status updates and
//! health-status changes affect registration state. Everything else
//! becomes an `Unchanged` event the engine filters out.

use serde_json::Value;
use tracing::debug;

use gangway_core::{Action, AddressResolver, ServiceEvent};

use crate::model::{HealthStatusChangedEvent, StatusUpdateEvent};

/// Task statuses that mean a task entered the running state.
const STARTUP_TASK_STATUSES: [&str; 1] = ["TASK_RUNNING"];

/// Task statuses that mean a task reached a terminal state.
const TERMINAL_TASK_STATUSES: [&str; 4] =
    ["TASK_FINISHED", "TASK_FAILED", "TASK_KILLED", "TASK_LOST"];

/// Normalized event payload, tagged by shape.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    StatusUpdate(StatusUpdateEvent),
    HealthChange(HealthStatusChangedEvent),
    Other,
}

/// Classify a raw frame into a tagged payload.
///
/// The event name comes from the SSE `event:` field when present, falling
/// back to the payload's own `eventType`. A payload that does not decode
/// as its advertised shape classifies as `Other`.
pub fn classify(event_name: &str, payload: &Value) -> SchedulerEvent {
    let name = if event_name.is_empty() {
        payload.get("eventType").and_then(Value::as_str).unwrap_or("")
    } else {
        event_name
    };

    match name {
        "status_update_event" => serde_json::from_value(payload.clone())
            .map(SchedulerEvent::StatusUpdate)
            .unwrap_or(SchedulerEvent::Other),
        "health_status_changed_event" => serde_json::from_value(payload.clone())
            .map(SchedulerEvent::HealthChange)
            .unwrap_or(SchedulerEvent::Other),
        _ => SchedulerEvent::Other,
    }
}

/// Translate a tagged payload into the engine-facing event.
///
/// Status updates resolve the host best-effort: a resolver failure leaves
/// the IP empty but keeps the event, the engine correlates by task ID.
pub async fn to_service_event(
    payload: SchedulerEvent,
    raw: Value,
    resolver: &dyn AddressResolver,
) -> ServiceEvent {
    match payload {
        SchedulerEvent::StatusUpdate(update) => {
            let ip = match resolver.resolve(&update.host).await {
                Ok(ip) => ip,
                Err(e) => {
                    debug!(host = %update.host, error = %e, "event host resolution failed");
                    String::new()
                }
            };

            let action = if TERMINAL_TASK_STATUSES.contains(&update.task_status.as_str()) {
                Action::Stopped
            } else if STARTUP_TASK_STATUSES.contains(&update.task_status.as_str()) {
                Action::Started
            } else {
                Action::Unchanged
            };

            ServiceEvent {
                service_id: update.task_id,
                ip,
                action,
                original_event: raw,
            }
        }
        SchedulerEvent::HealthChange(change) => ServiceEvent {
            service_id: change.task_id,
            // The engine resolves the address through its cache.
            ip: String::new(),
            action: if change.alive {
                Action::WentUp
            } else {
                Action::WentDown
            },
            original_event: raw,
        },
        SchedulerEvent::Other => ServiceEvent::unchanged(raw),
    }
}
