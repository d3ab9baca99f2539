//! Wire model for the Consul agent API.

use serde::{Deserialize, Deserializer, Serialize};

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of `GET /v1/agent/services`.
///
/// The agent view carries neither health nor the original container
/// port; the engine only compares service keys, so those fields stay at
/// their empty values after grouping.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "Tags", default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Port", default)]
    pub port: u16,
}

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

/// The slice of `GET /v1/agent/self` the daemon cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSelf {
    #[serde(rename = "Config", default)]
    pub config: Option<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(rename = "AdvertiseAddr", default)]
    pub advertise_addr: Option<String>,
}
