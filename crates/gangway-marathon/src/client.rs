//! HTTP client for the Marathon API with HA member failover.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::ACCEPT;
use tracing::{debug, info, warn};

use gangway_core::{Error, Result};

use crate::model::{Application, Applications};

/// Bound on every snapshot request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect bound for the long-lived event subscription; the subscription
/// itself has no overall deadline.
const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Event classes the subscription asks for. Everything else the server
/// might still send translates to an `Unchanged` event downstream.
const SUBSCRIBED_EVENT_TYPES: [(&str, &str); 3] = [
    ("event_type", "status_update_event"),
    ("event_type", "health_status_changed_event"),
    ("event_type", "framework_message_event"),
];

/// Raw byte stream of an established event subscription.
pub type EventByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>;

/// Thin client over one or more Marathon members.
///
/// Requests try the members in configuration order and fail over on
/// transport errors or non-success statuses; a member that answers but
/// produces an undecodable payload fails the call outright.
#[derive(Clone)]
pub struct MarathonClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    members: Vec<String>,
}

impl MarathonClient {
    pub fn new(urls: Vec<String>) -> Result<Self> {
        let members: Vec<String> = urls
            .into_iter()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if members.is_empty() {
            return Err(Error::Transport("no scheduler URL configured".to_string()));
        }

        info!(members = %members.join(","), "connecting to Marathon");
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::transport)?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(STREAM_CONNECT_TIMEOUT)
            .build()
            .map_err(Error::transport)?;

        Ok(MarathonClient {
            http,
            stream_http,
            members,
        })
    }

    /// Fetch all applications with their tasks embedded.
    pub async fn applications(&self) -> Result<Vec<Application>> {
        let mut last_err = None;
        for member in &self.members {
            let url = format!("{member}/v2/apps");
            let sent = self
                .http
                .get(&url)
                .query(&[("embed", "apps.tasks")])
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            match sent {
                Ok(resp) => {
                    let parsed: Applications = resp.json().await.map_err(Error::decode)?;
                    debug!(member = %member, apps = parsed.apps.len(), "fetched applications");
                    return Ok(parsed.apps);
                }
                Err(e) => {
                    warn!(member = %member, error = %e, "scheduler member unavailable");
                    last_err = Some(Error::transport(e));
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::Transport("no scheduler member configured".to_string())))
    }

    /// Open the Server-Sent-Events subscription.
    ///
    /// Returns once response headers arrive, i.e. the subscription is
    /// live; reading the stream is the caller's business.
    pub async fn event_stream(&self) -> Result<EventByteStream> {
        let mut last_err = None;
        for member in &self.members {
            let url = format!("{member}/v2/events");
            let sent = self
                .stream_http
                .get(&url)
                .query(&SUBSCRIBED_EVENT_TYPES)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            match sent {
                Ok(resp) => {
                    debug!(member = %member, "event subscription established");
                    return Ok(Box::pin(resp.bytes_stream()));
                }
                Err(e) => {
                    warn!(member = %member, error = %e, "event subscription attempt failed");
                    last_err = Some(Error::transport(e));
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::Transport("no scheduler member configured".to_string())))
    }
}
