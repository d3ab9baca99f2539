//! Registry adapter over the Consul agent HTTP API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use gangway_core::{Error, RegistryAdapter, Result, Service, ServiceGroup};

use crate::model::{AgentSelf, AgentService, AgentServiceRegistration};

/// Bound on every agent request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Registry adapter talking to the node-local agent.
pub struct ConsulAdapter {
    http: reqwest::Client,
    base_url: String,
    dry_run: bool,
}

impl ConsulAdapter {
    pub fn new(base_url: &str, dry_run: bool) -> Result<Self> {
        info!(url = %base_url, dry_run, "connecting to Consul agent");
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::transport)?;

        Ok(ConsulAdapter {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            dry_run,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RegistryAdapter for ConsulAdapter {
    async fn services(&self) -> Result<Vec<ServiceGroup>> {
        let resp = self
            .http
            .get(self.url("/v1/agent/services"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Error::transport)?;
        let services: HashMap<String, AgentService> =
            resp.json().await.map_err(Error::decode)?;

        let mut groups = Vec::with_capacity(services.len());
        for entry in services.into_values() {
            debug!(
                id = %entry.id,
                name = %entry.service,
                ip = %entry.address,
                port = entry.port,
                "registry service"
            );
            groups.push(ServiceGroup {
                id: group_id(&entry.id).to_string(),
                ip: entry.address,
                services: vec![Service {
                    id: entry.id,
                    name: entry.service,
                    tags: entry.tags,
                    healthy: false,
                    original_port: 0,
                    exposed_port: entry.port,
                }],
            });
        }
        Ok(groups)
    }

    async fn register(&self, group: &ServiceGroup) -> Result<()> {
        for service in &group.services {
            if self.dry_run {
                info!(
                    ip = %group.ip,
                    id = %service.id,
                    name = %service.name,
                    port = service.exposed_port,
                    "[dry-run] would register service"
                );
                continue;
            }

            info!(
                ip = %group.ip,
                id = %service.id,
                name = %service.name,
                port = service.exposed_port,
                "registering service"
            );
            let registration = AgentServiceRegistration {
                id: service.id.clone(),
                name: service.name.clone(),
                tags: service.tags.clone(),
                address: group.ip.clone(),
                port: service.exposed_port,
            };
            self.http
                .put(self.url("/v1/agent/service/register"))
                .json(&registration)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(Error::transport)?;
        }
        Ok(())
    }

    async fn deregister(&self, group: &ServiceGroup) -> Result<()> {
        for service in &group.services {
            if self.dry_run {
                info!(
                    ip = %group.ip,
                    id = %service.id,
                    name = %service.name,
                    "[dry-run] would deregister service"
                );
                continue;
            }

            info!(
                ip = %group.ip,
                id = %service.id,
                name = %service.name,
                "deregistering service"
            );
            self.http
                .put(self.url(&format!("/v1/agent/service/deregister/{}", service.id)))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(Error::transport)?;
        }
        Ok(())
    }

    async fn advertise_addr(&self) -> Result<String> {
        let resp = self
            .http
            .get(self.url("/v1/agent/self"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Error::transport)?;
        let agent: AgentSelf = resp.json().await.map_err(Error::decode)?;
        extract_advertise_addr(agent)
    }

    async fn ping(&self) -> Result<()> {
        let resp = self
            .http
            .get(self.url("/v1/status/leader"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Error::transport)?;
        let leader: String = resp.json().await.map_err(Error::decode)?;
        debug!(%leader, "registry leader");
        Ok(())
    }
}

/// Task-ID prefix of a service ID: everything before the last `:`, the
/// full ID when the separator is absent or leading.
fn group_id(service_id: &str) -> &str {
    match service_id.rfind(':') {
        Some(i) if i > 0 => &service_id[..i],
        _ => service_id,
    }
}

fn extract_advertise_addr(agent: AgentSelf) -> Result<String> {
    agent
        .config
        .and_then(|c| c.advertise_addr)
        .ok_or(Error::AdvertiseAddrMissing)
}
