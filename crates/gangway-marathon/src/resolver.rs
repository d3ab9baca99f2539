//! Default DNS-backed implementation of the address-resolver port.

use async_trait::async_trait;
use tracing::warn;

use gangway_core::{AddressResolver, Error, Result};

/// Resolves hostnames through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(&self, hostname: &str) -> Result<String> {
        // The port is a lookup_host formality; only the address matters.
        let addrs = tokio::net::lookup_host((hostname, 0)).await.map_err(|e| {
            warn!(hostname = %hostname, error = %e, "unable to resolve address");
            Error::Resolve {
                host: hostname.to_string(),
                reason: e.to_string(),
            }
        })?;

        addrs
            .map(|addr| addr.ip().to_string())
            .next()
            .ok_or_else(|| Error::Resolve {
                host: hostname.to_string(),
                reason: "resolver returned no addresses".to_string(),
            })
    }
}
