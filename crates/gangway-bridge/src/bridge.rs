//! The reconciliation engine.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use gangway_core::{
    Action, RegistryAdapter, Result, SchedulerAdapter, ServiceEvent, ServiceGroup, TaskId,
};

/// Capacity of the scheduler → engine event channel. Small on purpose:
/// a full channel blocks the producer rather than dropping events.
pub const EVENT_CHANNEL_CAPACITY: usize = 5;

/// Outcome of one full sync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub registered: u32,
    pub deregistered: u32,
}

/// Engine state, single-writer under the engine mutex.
#[derive(Default)]
struct EngineState {
    /// Task ID → group, rebuilt wholesale on every refresh. Includes
    /// foreign-host groups so later events still correlate by ID.
    cache: HashMap<TaskId, ServiceGroup>,
    /// The registry agent's advertised address; the locality filter.
    advertise_addr: String,
}

/// Bridges the scheduler to the registry.
pub struct Bridge {
    scheduler: Arc<dyn SchedulerAdapter>,
    registry: Arc<dyn RegistryAdapter>,
    state: Mutex<EngineState>,
}

impl Bridge {
    pub fn new(
        scheduler: Arc<dyn SchedulerAdapter>,
        registry: Arc<dyn RegistryAdapter>,
    ) -> Self {
        Bridge {
            scheduler,
            registry,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Full synchronization of scheduler tasks to the registry.
    ///
    /// Any adapter error aborts the attempt; no partial convergence is
    /// better than wrong partial convergence, and the next tick retries.
    pub async fn sync(&self) -> Result<SyncStats> {
        let mut state = self.state.lock().await;

        let registry_groups = self.registry.services().await?;
        let registry_set = index_groups(&registry_groups);
        let scheduler_set = self.refresh(&mut state).await?;

        let mut stats = SyncStats::default();

        for (key, group) in &scheduler_set {
            let service = &group.services[0];
            if group.ip != state.advertise_addr {
                debug!(
                    key = %key,
                    ip = %group.ip,
                    advertise_addr = %state.advertise_addr,
                    "skipping foreign-host service"
                );
                continue;
            }
            if !service.healthy {
                debug!(key = %key, "skipping unhealthy service");
                continue;
            }
            if registry_set.contains_key(key) {
                continue;
            }
            self.registry.register(group).await?;
            stats.registered += 1;
        }

        // The scheduler side is the only filter here: registry entries
        // referencing other nodes' addresses are dangling from this
        // node's perspective as well, and nothing else cleans them.
        for (key, group) in &registry_set {
            if scheduler_set.contains_key(key) {
                continue;
            }
            self.registry.deregister(group).await?;
            stats.deregistered += 1;
        }

        if stats == SyncStats::default() {
            info!("scheduler and registry are in sync");
        } else {
            info!(
                registered = stats.registered,
                deregistered = stats.deregistered,
                "sync complete"
            );
        }
        Ok(stats)
    }

    /// Rebuild the task cache from the scheduler and return the
    /// scheduler-side service set.
    ///
    /// The cache swap is a single assignment under the engine mutex, so
    /// concurrent event processing never observes a half-built cache.
    async fn refresh(
        &self,
        state: &mut EngineState,
    ) -> Result<HashMap<String, ServiceGroup>> {
        state.advertise_addr = self.registry.advertise_addr().await?;

        let groups = self.scheduler.services().await?;
        let mut cache = HashMap::with_capacity(groups.len());
        let mut scheduler_set = HashMap::new();
        for group in groups {
            for service in &group.services {
                scheduler_set.insert(service.service_key(&group.ip), group.singleton(service));
            }
            cache.insert(group.id.clone(), group);
        }
        state.cache = cache;

        debug!(
            tasks = state.cache.len(),
            services = scheduler_set.len(),
            advertise_addr = %state.advertise_addr,
            "scheduler cache refreshed"
        );
        Ok(scheduler_set)
    }

    /// Subscribe to scheduler events and drain them until the stream
    /// closes.
    ///
    /// Returns an error only when subscribing fails; per-event errors
    /// are logged and swallowed because the periodic tick restores
    /// correctness. A closed channel ends the loop cleanly.
    pub async fn process_events(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.scheduler.subscribe(tx).await?;

        while let Some(event) = rx.recv().await {
            if event.action == Action::Unchanged {
                continue;
            }
            self.handle_event(&event).await;
        }

        info!("scheduler event channel closed");
        Ok(())
    }

    async fn handle_event(&self, event: &ServiceEvent) {
        let mut state = self.state.lock().await;
        debug!(
            id = %event.service_id,
            ip = %event.ip,
            action = ?event.action,
            payload = %event.original_event,
            "processing scheduler event"
        );

        match event.action {
            Action::Started => {
                // The new task may not be healthy yet; registration
                // happens on WentUp or on the next full sync.
                if let Err(e) = self.refresh(&mut state).await {
                    warn!(error = %e, "cache refresh after task start failed");
                }
            }
            Action::Stopped => {
                if event.ip != state.advertise_addr {
                    debug!(id = %event.service_id, ip = %event.ip, "stopped task is foreign, skipping");
                    return;
                }
                match state.cache.remove(&event.service_id) {
                    Some(group) => {
                        if let Err(e) = self.registry.deregister(&group).await {
                            warn!(
                                error = %e,
                                id = %group.id,
                                "deregistration failed, next resync will clean up"
                            );
                        }
                    }
                    None => warn!(
                        id = %event.service_id,
                        "stopped task not found in cache, dropping event"
                    ),
                }
            }
            Action::WentUp => match state.cache.get(&event.service_id) {
                Some(group) if group.ip == state.advertise_addr => {
                    if let Err(e) = self.registry.register(group).await {
                        warn!(
                            error = %e,
                            id = %group.id,
                            "registration failed, next resync will retry"
                        );
                    }
                }
                Some(group) => {
                    debug!(id = %group.id, ip = %group.ip, "healthy task is foreign, skipping")
                }
                None => warn!(
                    id = %event.service_id,
                    "healthy task not found in cache, dropping event"
                ),
            },
            Action::WentDown => match state.cache.get(&event.service_id) {
                Some(group) if group.ip == state.advertise_addr => {
                    if let Err(e) = self.registry.deregister(group).await {
                        warn!(
                            error = %e,
                            id = %group.id,
                            "deregistration failed, next resync will clean up"
                        );
                    }
                }
                Some(group) => {
                    debug!(id = %group.id, ip = %group.ip, "unhealthy task is foreign, skipping")
                }
                None => warn!(
                    id = %event.service_id,
                    "unhealthy task not found in cache, dropping event"
                ),
            },
            Action::Unchanged => {}
        }
    }
}

/// Index groups into the per-service comparison set: service key →
/// singleton group carrying just that service.
fn index_groups(groups: &[ServiceGroup]) -> HashMap<String, ServiceGroup> {
    let mut set = HashMap::new();
    for group in groups {
        for service in &group.services {
            set.insert(service.service_key(&group.ip), group.singleton(service));
        }
    }
    set
}
