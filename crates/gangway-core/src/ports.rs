//! Adapter ports consumed by the reconciliation engine.
//!
//! The engine never talks HTTP itself; it drives these traits. Concrete
//! implementations live in `gangway-marathon` and `gangway-consul`, and
//! the engine's test suite substitutes recording mocks.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{ServiceEvent, ServiceGroup};

/// Bounded channel the scheduler adapter pushes translated events into.
///
/// Sends block when the channel is full; that back-pressure is deliberate,
/// dropping events would desync the cache.
pub type EventSink = mpsc::Sender<ServiceEvent>;

/// Hostname → IP resolution, abstracted for testability.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve a hostname to an IP address string.
    async fn resolve(&self, hostname: &str) -> Result<String>;
}

/// The container scheduler side: snapshot queries plus a push stream.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// Enumerate all applications and their tasks, one [`ServiceGroup`]
    /// per task. Any task that fails translation fails the whole call.
    async fn services(&self) -> Result<Vec<ServiceGroup>>;

    /// Install a long-lived subscription that emits translated events
    /// onto `sink`. Returning `Ok` means the subscription is live, not
    /// that any event has arrived; the stream ends by dropping the sink.
    async fn subscribe(&self, sink: EventSink) -> Result<()>;
}

/// The service registry side: CRUD on the local agent.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Every service the local agent holds, grouped by task-ID prefix.
    async fn services(&self) -> Result<Vec<ServiceGroup>>;

    /// Register each service in the group at the group's address.
    /// Fails fast on the first error; the next resync tick recovers the
    /// remainder.
    async fn register(&self, group: &ServiceGroup) -> Result<()>;

    /// Deregister each service in the group by ID.
    async fn deregister(&self, group: &ServiceGroup) -> Result<()>;

    /// The address on which the agent publishes itself; used as the
    /// engine's locality filter.
    async fn advertise_addr(&self) -> Result<String>;

    /// Startup readiness probe.
    async fn ping(&self) -> Result<()>;
}
