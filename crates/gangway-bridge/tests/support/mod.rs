//! Recording mock adapters shared by the bridge test suites.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use gangway_core::{
    Action, Error, EventSink, RegistryAdapter, Result, SchedulerAdapter, Service,
    ServiceEvent, ServiceGroup,
};

pub fn service(task: &str, name: &str, original: u16, exposed: u16, healthy: bool) -> Service {
    Service {
        id: format!("{task}:{original}"),
        name: name.to_string(),
        tags: vec![],
        healthy,
        original_port: original,
        exposed_port: exposed,
    }
}

pub fn group(task: &str, ip: &str, services: Vec<Service>) -> ServiceGroup {
    ServiceGroup {
        id: task.to_string(),
        ip: ip.to_string(),
        services,
    }
}

pub fn event(id: &str, ip: &str, action: Action) -> ServiceEvent {
    ServiceEvent {
        service_id: id.to_string(),
        ip: ip.to_string(),
        action,
        original_event: serde_json::Value::Null,
    }
}

fn pop_error(errors: &Mutex<Vec<String>>) -> Option<String> {
    let mut queued = errors.lock().unwrap();
    if queued.is_empty() {
        None
    } else {
        Some(queued.remove(0))
    }
}

/// Scheduler mock: serves a fixed group list and a scripted event
/// sequence; the sink is dropped after the script, closing the channel.
#[derive(Default)]
pub struct MockScheduler {
    pub groups: Mutex<Vec<ServiceGroup>>,
    pub events: Mutex<Vec<ServiceEvent>>,
    pub services_calls: AtomicUsize,
    pub services_errors: Mutex<Vec<String>>,
    pub subscribe_errors: Mutex<Vec<String>>,
    /// When set, `subscribe` parks the sink instead of scripting events,
    /// keeping the channel open until `release_subscription`.
    pub hold_subscription: AtomicBool,
    held_sink: Mutex<Option<EventSink>>,
}

impl MockScheduler {
    pub fn with_groups(groups: Vec<ServiceGroup>) -> Self {
        MockScheduler {
            groups: Mutex::new(groups),
            ..MockScheduler::default()
        }
    }

    pub fn queue_events(&self, events: Vec<ServiceEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn queue_services_error(&self, message: &str) {
        self.services_errors.lock().unwrap().push(message.to_string());
    }

    pub fn queue_subscribe_error(&self, message: &str) {
        self.subscribe_errors.lock().unwrap().push(message.to_string());
    }

    pub fn release_subscription(&self) {
        *self.held_sink.lock().unwrap() = None;
    }
}

#[async_trait]
impl SchedulerAdapter for MockScheduler {
    async fn services(&self) -> Result<Vec<ServiceGroup>> {
        self.services_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = pop_error(&self.services_errors) {
            return Err(Error::Transport(message));
        }
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn subscribe(&self, sink: EventSink) -> Result<()> {
        if let Some(message) = pop_error(&self.subscribe_errors) {
            return Err(Error::Transport(message));
        }
        if self.hold_subscription.load(Ordering::SeqCst) {
            *self.held_sink.lock().unwrap() = Some(sink);
            return Ok(());
        }
        let events = self.events.lock().unwrap().clone();
        tokio::spawn(async move {
            for event in events {
                if sink.send(event).await.is_err() {
                    return;
                }
            }
            // Dropping the sink here closes the engine's channel.
        });
        Ok(())
    }
}

/// Registry mock: records every register/deregister and, when mirroring,
/// reflects them back through `services()` like a real agent would.
#[derive(Default)]
pub struct MockRegistry {
    pub advertise: Mutex<String>,
    pub store: Mutex<HashMap<String, ServiceGroup>>,
    pub registered: Mutex<Vec<ServiceGroup>>,
    pub deregistered: Mutex<Vec<ServiceGroup>>,
    pub mirror: AtomicBool,
    pub services_calls: AtomicUsize,
    pub ping_calls: AtomicUsize,
    pub services_errors: Mutex<Vec<String>>,
    pub advertise_errors: Mutex<Vec<String>>,
    pub ping_errors: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn with_addr(addr: &str) -> Self {
        MockRegistry {
            advertise: Mutex::new(addr.to_string()),
            ..MockRegistry::default()
        }
    }

    /// A registry whose `services()` view tracks register/deregister.
    pub fn mirrored(addr: &str) -> Self {
        let registry = Self::with_addr(addr);
        registry.mirror.store(true, Ordering::SeqCst);
        registry
    }

    /// Pre-populate the agent view with a group's services.
    pub fn seed(&self, group: &ServiceGroup) {
        let mut store = self.store.lock().unwrap();
        for service in &group.services {
            store.insert(service.id.clone(), group.singleton(service));
        }
    }

    pub fn queue_services_error(&self, message: &str) {
        self.services_errors.lock().unwrap().push(message.to_string());
    }

    pub fn queue_advertise_error(&self, message: &str) {
        self.advertise_errors.lock().unwrap().push(message.to_string());
    }

    pub fn queue_ping_error(&self, message: &str) {
        self.ping_errors.lock().unwrap().push(message.to_string());
    }

    pub fn registered_count(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    pub fn deregistered_count(&self) -> usize {
        self.deregistered.lock().unwrap().len()
    }

    pub fn clear_recorded(&self) {
        self.registered.lock().unwrap().clear();
        self.deregistered.lock().unwrap().clear();
    }
}

#[async_trait]
impl RegistryAdapter for MockRegistry {
    async fn services(&self) -> Result<Vec<ServiceGroup>> {
        self.services_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = pop_error(&self.services_errors) {
            return Err(Error::Transport(message));
        }
        Ok(self.store.lock().unwrap().values().cloned().collect())
    }

    async fn register(&self, group: &ServiceGroup) -> Result<()> {
        self.registered.lock().unwrap().push(group.clone());
        if self.mirror.load(Ordering::SeqCst) {
            let mut store = self.store.lock().unwrap();
            for service in &group.services {
                store.insert(service.id.clone(), group.singleton(service));
            }
        }
        Ok(())
    }

    async fn deregister(&self, group: &ServiceGroup) -> Result<()> {
        self.deregistered.lock().unwrap().push(group.clone());
        if self.mirror.load(Ordering::SeqCst) {
            let mut store = self.store.lock().unwrap();
            for service in &group.services {
                store.remove(&service.id);
            }
        }
        Ok(())
    }

    async fn advertise_addr(&self) -> Result<String> {
        if let Some(message) = pop_error(&self.advertise_errors) {
            return Err(Error::Transport(message));
        }
        Ok(self.advertise.lock().unwrap().clone())
    }

    async fn ping(&self) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = pop_error(&self.ping_errors) {
            return Err(Error::Transport(message));
        }
        Ok(())
    }
}
