//! Task → ServiceGroup translation and the scheduler adapter.
//!
//! Translation policy, per task:
//!
//! - the task host resolves to an IP; failure fails the whole snapshot
//!   (a half-translated snapshot would corrupt reconciliation)
//! - original ports come from Docker port mappings when the app has
//!   them, otherwise from the app's own port list; a count mismatch with
//!   the task's exposed ports rejects the task
//! - `SERVICE_*` env vars and labels override the derived name and
//!   supply tags, with labels winning over env and `SERVICE_<port>_*`
//!   keys scoped to one original port

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use gangway_core::{
    AddressResolver, Error, EventSink, Result, SchedulerAdapter, Service, ServiceGroup,
};

use crate::client::{EventByteStream, MarathonClient};
use crate::events::{classify, to_service_event};
use crate::model::{Application, Task};
use crate::resolver::DnsResolver;
use crate::sse::SseDecoder;

/// Pause between event-stream reconnect attempts.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Scheduler adapter over the Marathon REST API.
pub struct MarathonAdapter {
    client: MarathonClient,
    resolver: Arc<dyn AddressResolver>,
}

impl MarathonAdapter {
    /// Connect to the given members with the system DNS resolver.
    pub fn new(urls: Vec<String>) -> Result<Self> {
        Self::with_resolver(urls, Arc::new(DnsResolver))
    }

    /// Connect with an injected resolver.
    pub fn with_resolver(
        urls: Vec<String>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Result<Self> {
        Ok(MarathonAdapter {
            client: MarathonClient::new(urls)?,
            resolver,
        })
    }

    async fn to_service_group(&self, task: &Task, app: &Application) -> Result<ServiceGroup> {
        let ip = self.resolver.resolve(&task.host).await?;

        let original_ports = original_ports(app);
        if task.ports.len() != original_ports.len() {
            return Err(Error::PortCountMismatch {
                task: task.id.clone(),
            });
        }

        let default_name = default_name(&app.id);
        let multi_port = task.ports.len() > 1;
        let healthy = is_healthy(task, app);

        let mut services = Vec::with_capacity(task.ports.len());
        for (i, &exposed_port) in task.ports.iter().enumerate() {
            let original_port = original_ports[i];
            let metadata = service_metadata(app, original_port);

            let name = metadata
                .get("name")
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| {
                    if multi_port {
                        format!("{default_name}-{original_port}")
                    } else {
                        default_name.clone()
                    }
                });
            let tags = parse_tags(metadata.get("tags").map(String::as_str).unwrap_or(""));

            services.push(Service {
                id: format!("{}:{}", task.id, original_port),
                name,
                tags,
                healthy,
                original_port,
                exposed_port,
            });
        }

        Ok(ServiceGroup {
            id: task.id.clone(),
            ip,
            services,
        })
    }
}

#[async_trait]
impl SchedulerAdapter for MarathonAdapter {
    async fn services(&self) -> Result<Vec<ServiceGroup>> {
        let apps = self.client.applications().await?;

        let mut groups = Vec::new();
        for app in &apps {
            for task in &app.tasks {
                let group = self.to_service_group(task, app).await?;
                for service in &group.services {
                    debug!(
                        ip = %group.ip,
                        id = %service.id,
                        name = %service.name,
                        port = service.exposed_port,
                        healthy = service.healthy,
                        "scheduler service"
                    );
                }
                groups.push(group);
            }
        }
        Ok(groups)
    }

    async fn subscribe(&self, sink: EventSink) -> Result<()> {
        // The first connection decides whether subscribing succeeded;
        // later drops are handled by the pump's own reconnect loop.
        let stream = self.client.event_stream().await?;
        info!("subscribed to scheduler event stream");

        let client = self.client.clone();
        let resolver = self.resolver.clone();
        tokio::spawn(run_event_pump(client, resolver, stream, sink));
        Ok(())
    }
}

/// Read frames, translate, and forward until the engine side goes away.
///
/// A terminated stream is re-established after a pause; the pump only
/// ends when the sink closes, which is the engine's shutdown signal.
async fn run_event_pump(
    client: MarathonClient,
    resolver: Arc<dyn AddressResolver>,
    mut stream: EventByteStream,
    sink: EventSink,
) {
    loop {
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "event stream read failed");
                    break;
                }
            };
            for message in decoder.push(&chunk) {
                let raw: Value =
                    serde_json::from_str(&message.data).unwrap_or(Value::Null);
                let payload = classify(&message.event, &raw);
                let event = to_service_event(payload, raw, resolver.as_ref()).await;
                if sink.send(event).await.is_err() {
                    debug!("event sink closed, stopping pump");
                    return;
                }
            }
        }

        warn!(
            retry_in = ?RECONNECT_INTERVAL,
            "scheduler event stream ended, reconnecting"
        );
        loop {
            tokio::time::sleep(RECONNECT_INTERVAL).await;
            if sink.is_closed() {
                debug!("event sink closed, stopping pump");
                return;
            }
            match client.event_stream().await {
                Ok(next) => {
                    info!("scheduler event stream re-established");
                    stream = next;
                    break;
                }
                Err(e) => warn!(error = %e, "event stream reconnect failed"),
            }
        }
    }
}

/// Last path segment of an application ID.
fn default_name(app_id: &str) -> String {
    app_id.rsplit('/').next().unwrap_or(app_id).to_string()
}

/// The container-internal ports, index-aligned with the task's exposed
/// ports.
fn original_ports(app: &Application) -> Vec<u16> {
    if let Some(mappings) = app
        .container
        .as_ref()
        .and_then(|c| c.docker.as_ref())
        .and_then(|d| d.port_mappings.as_ref())
    {
        return mappings.iter().map(|m| m.container_port).collect();
    }
    app.ports.clone()
}

/// Health aggregation: healthy by absence of checks, unhealthy while
/// results are still being gathered, otherwise every check must be alive.
fn is_healthy(task: &Task, app: &Application) -> bool {
    if app.health_checks.is_empty() {
        return true;
    }
    if app.health_checks.len() != task.health_check_results.len() {
        return false;
    }
    task.health_check_results.iter().all(|r| r.alive)
}

/// Collect `SERVICE_*` metadata applying to one original port, env first,
/// labels second so labels win.
fn service_metadata(app: &Application, port: u16) -> HashMap<String, String> {
    let port = port.to_string();
    let mut metadata = HashMap::new();
    extract_service_metadata(&app.env, &mut metadata, &port);
    extract_service_metadata(&app.labels, &mut metadata, &port);
    metadata
}

fn extract_service_metadata(
    source: &HashMap<String, String>,
    destination: &mut HashMap<String, String>,
    port: &str,
) {
    for (key, value) in source {
        let Some(stripped) = strip_service_prefix(key) else {
            continue;
        };
        let key = stripped.to_lowercase();

        // `<digits>_<rest>` scopes the key to one original port.
        if let Some((head, rest)) = key.split_once('_') {
            if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) {
                if head == port {
                    destination.insert(rest.to_string(), value.clone());
                }
                continue;
            }
        }
        destination.insert(key, value.clone());
    }
}

fn strip_service_prefix(key: &str) -> Option<&str> {
    const PREFIX: &str = "SERVICE_";
    if key.len() >= PREFIX.len() && key[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        Some(&key[PREFIX.len()..])
    } else {
        None
    }
}

/// Split a comma-separated tag string; an empty input yields no tags, a
/// non-empty input preserves empty elements.
fn parse_tags(tag_string: &str) -> Vec<String> {
    if tag_string.is_empty() {
        return Vec::new();
    }
    tag_string.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Container, Docker, HealthCheck, HealthCheckResult, PortMapping,
    };

    struct FixedResolver(&'static str);

    #[async_trait]
    impl AddressResolver for FixedResolver {
        async fn resolve(&self, _hostname: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl AddressResolver for FailingResolver {
        async fn resolve(&self, hostname: &str) -> Result<String> {
            Err(Error::Resolve {
                host: hostname.to_string(),
                reason: "no such host".to_string(),
            })
        }
    }

    fn adapter_with(resolver: Arc<dyn AddressResolver>) -> MarathonAdapter {
        MarathonAdapter::with_resolver(vec!["http://127.0.0.1:8080".to_string()], resolver)
            .unwrap()
    }

    fn web_app() -> Application {
        Application {
            id: "/app/staging/web-app".to_string(),
            ports: vec![80, 8080],
            env: HashMap::from([
                ("SERVICE_TAGS".to_string(), "production".to_string()),
                ("SERVICE_80_NAME".to_string(), "web-app-1".to_string()),
                ("SERVICE_8080_NAME".to_string(), "web-app-2".to_string()),
            ]),
            ..Application::default()
        }
    }

    fn web_task() -> Task {
        Task {
            id: "0000-web-app-12345098765".to_string(),
            host: "web.eu-west-1.internal".to_string(),
            ports: vec![31045, 31046],
            health_check_results: vec![],
        }
    }

    #[tokio::test]
    async fn multi_port_translation_with_port_scoped_names() {
        let adapter = adapter_with(Arc::new(FixedResolver("127.0.0.1")));
        let group = adapter
            .to_service_group(&web_task(), &web_app())
            .await
            .unwrap();

        assert_eq!(group.id, "0000-web-app-12345098765");
        assert_eq!(group.ip, "127.0.0.1");
        assert_eq!(group.services.len(), 2);

        let first = &group.services[0];
        assert_eq!(first.id, "0000-web-app-12345098765:80");
        assert_eq!(first.name, "web-app-1");
        assert_eq!(first.tags, vec!["production".to_string()]);
        assert_eq!(first.original_port, 80);
        assert_eq!(first.exposed_port, 31045);

        let second = &group.services[1];
        assert_eq!(second.id, "0000-web-app-12345098765:8080");
        assert_eq!(second.name, "web-app-2");
        assert_eq!(second.tags, vec!["production".to_string()]);
        assert_eq!(second.exposed_port, 31046);
    }

    #[tokio::test]
    async fn multi_port_default_names_are_port_suffixed() {
        let adapter = adapter_with(Arc::new(FixedResolver("127.0.0.1")));
        let mut app = web_app();
        app.env.clear();

        let group = adapter.to_service_group(&web_task(), &app).await.unwrap();
        assert_eq!(group.services[0].name, "web-app-80");
        assert_eq!(group.services[1].name, "web-app-8080");
    }

    #[tokio::test]
    async fn single_port_keeps_the_default_name_unsuffixed() {
        let adapter = adapter_with(Arc::new(FixedResolver("127.0.0.1")));
        let app = Application {
            id: "/db/mongo".to_string(),
            ports: vec![27017],
            ..Application::default()
        };
        let task = Task {
            id: "db_server_x".to_string(),
            host: "db.internal".to_string(),
            ports: vec![31045],
            ..Task::default()
        };

        let group = adapter.to_service_group(&task, &app).await.unwrap();
        assert_eq!(group.services.len(), 1);
        assert_eq!(group.services[0].name, "mongo");
        assert_eq!(group.services[0].id, "db_server_x:27017");
    }

    #[tokio::test]
    async fn docker_port_mappings_override_app_ports() {
        let adapter = adapter_with(Arc::new(FixedResolver("127.0.0.1")));
        let mut app = web_app();
        app.env.clear();
        // App-level ports diverge on purpose; the mapping wins.
        app.ports = vec![9999, 9998];
        app.container = Some(Container {
            docker: Some(Docker {
                image: Some("corp/web".to_string()),
                port_mappings: Some(vec![
                    PortMapping {
                        container_port: 80,
                        ..PortMapping::default()
                    },
                    PortMapping {
                        container_port: 8080,
                        ..PortMapping::default()
                    },
                ]),
            }),
        });

        let group = adapter.to_service_group(&web_task(), &app).await.unwrap();
        assert_eq!(group.services[0].original_port, 80);
        assert_eq!(group.services[1].original_port, 8080);
    }

    #[tokio::test]
    async fn port_count_mismatch_rejects_the_task() {
        let adapter = adapter_with(Arc::new(FixedResolver("127.0.0.1")));
        let mut app = web_app();
        app.ports = vec![80];

        let err = adapter
            .to_service_group(&web_task(), &app)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PortCountMismatch { .. }));
    }

    #[tokio::test]
    async fn resolver_failure_fails_the_translation() {
        let adapter = adapter_with(Arc::new(FailingResolver));
        let err = adapter
            .to_service_group(&web_task(), &web_app())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolve { .. }));
    }

    #[tokio::test]
    async fn labels_override_env_metadata() {
        let adapter = adapter_with(Arc::new(FixedResolver("127.0.0.1")));
        let mut app = web_app();
        app.ports = vec![27017];
        app.env = HashMap::from([("SERVICE_NAME".to_string(), "from-env".to_string())]);
        app.labels =
            HashMap::from([("SERVICE_NAME".to_string(), "from-label".to_string())]);
        let task = Task {
            id: "t1".to_string(),
            host: "h".to_string(),
            ports: vec![31000],
            ..Task::default()
        };

        let group = adapter.to_service_group(&task, &app).await.unwrap();
        assert_eq!(group.services[0].name, "from-label");
    }

    #[test]
    fn port_scoped_metadata_applies_only_to_its_port() {
        let mut app = Application::default();
        app.env = HashMap::from([
            ("SERVICE_80_NAME".to_string(), "web".to_string()),
            ("SERVICE_TAGS".to_string(), "a,b".to_string()),
        ]);

        let for_80 = service_metadata(&app, 80);
        assert_eq!(for_80.get("name"), Some(&"web".to_string()));
        assert_eq!(for_80.get("tags"), Some(&"a,b".to_string()));

        let for_8080 = service_metadata(&app, 8080);
        assert_eq!(for_8080.get("name"), None);
        assert_eq!(for_8080.get("tags"), Some(&"a,b".to_string()));
    }

    #[test]
    fn service_prefix_is_case_insensitive() {
        let mut app = Application::default();
        app.env = HashMap::from([("service_name".to_string(), "lower".to_string())]);

        let metadata = service_metadata(&app, 80);
        assert_eq!(metadata.get("name"), Some(&"lower".to_string()));
    }

    #[test]
    fn non_service_keys_are_ignored() {
        let mut app = Application::default();
        app.env = HashMap::from([
            ("PATH".to_string(), "/bin".to_string()),
            ("SERVICES_NAME".to_string(), "typo".to_string()),
        ]);

        assert!(service_metadata(&app, 80).is_empty());
    }

    #[test]
    fn empty_tag_string_yields_no_tags() {
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn non_empty_tag_string_preserves_empty_elements() {
        assert_eq!(
            parse_tags("a,,b"),
            vec!["a".to_string(), String::new(), "b".to_string()]
        );
        assert_eq!(parse_tags("only"), vec!["only".to_string()]);
    }

    #[test]
    fn healthy_by_absence_of_checks() {
        let app = Application::default();
        let task = Task::default();
        assert!(is_healthy(&task, &app));
    }

    #[test]
    fn unhealthy_while_results_are_missing() {
        let app = Application {
            health_checks: vec![HealthCheck::default()],
            ..Application::default()
        };
        let task = Task::default();
        assert!(!is_healthy(&task, &app));
    }

    #[test]
    fn unhealthy_when_any_check_is_dead() {
        let app = Application {
            health_checks: vec![HealthCheck::default(), HealthCheck::default()],
            ..Application::default()
        };
        let task = Task {
            health_check_results: vec![
                HealthCheckResult { alive: true },
                HealthCheckResult { alive: false },
            ],
            ..Task::default()
        };
        assert!(!is_healthy(&task, &app));
    }

    #[test]
    fn healthy_when_all_checks_are_alive() {
        let app = Application {
            health_checks: vec![HealthCheck::default()],
            ..Application::default()
        };
        let task = Task {
            health_check_results: vec![HealthCheckResult { alive: true }],
            ..Task::default()
        };
        assert!(is_healthy(&task, &app));
    }

    #[test]
    fn default_name_is_the_last_path_segment() {
        assert_eq!(default_name("/app/staging/web-app"), "web-app");
        assert_eq!(default_name("flat"), "flat");
    }
}
