//! Broker health alerts.
//!
//! Each cycle reads the management API overview of every registered server and
//! alerts once per day on a queue backlog, and once per day for each node that
//! is not running.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use warren_scheduler::{
    ItemError, Monitor, Notification, SchedulerError, SideEffectKey, SideEffectOutcome,
};

use super::MonitorContext;
use crate::http::{self, CheckError};
use crate::store::BrokerServer;

/// Subset of the management API `/api/overview` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerOverview {
    #[serde(default)]
    pub queue_totals: QueueTotals,
    #[serde(default)]
    pub broker_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueTotals {
    #[serde(default)]
    pub messages: u64,
}

/// One entry of the management API `/api/nodes` response.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    pub name: String,
    pub running: bool,
}

pub struct BrokerMonitor {
    ctx: MonitorContext,
    backlog_threshold: u64,
}

impl BrokerMonitor {
    pub fn new(ctx: MonitorContext, backlog_threshold: u64) -> Self {
        Self {
            ctx,
            backlog_threshold,
        }
    }

    async fn get<T>(&self, server: &BrokerServer, api_path: &str) -> Result<T, ItemError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!(
            "{}/api/{}",
            server.management_url.trim_end_matches('/'),
            api_path
        );
        let value = self
            .ctx
            .invoker
            .invoke_cancellable(&self.ctx.policy, |signal| {
                let mut request = self.ctx.client.get(&url);
                if let Some(username) = &server.username {
                    request = request.basic_auth(username, server.password.as_deref());
                }
                async move {
                    tokio::select! {
                        result = http::send_json::<T>(request) => result,
                        _ = signal.cancelled() => Err(CheckError::Cancelled),
                    }
                }
            })
            .await?;
        Ok(value)
    }

    async fn alert(
        &self,
        server: &BrokerServer,
        kind: String,
        subject: String,
        body: String,
    ) -> Result<SideEffectOutcome, SchedulerError> {
        let key = SideEffectKey::new(server.id.clone(), kind);
        let notification = Notification {
            source: self.name().to_string(),
            target_id: server.id.clone(),
            subject,
            body,
        };
        self.ctx.dispatch(&key, &notification).await
    }
}

/// Alerts raised by one server's state on `day`, as (kind, subject, body).
fn broker_alerts(
    server: &BrokerServer,
    overview: &BrokerOverview,
    nodes: &[NodeStatus],
    backlog_threshold: u64,
    day: NaiveDate,
) -> Vec<(String, String, String)> {
    let mut alerts = Vec::new();

    let messages = overview.queue_totals.messages;
    if messages > backlog_threshold {
        alerts.push((
            format!("queue_backlog:{}", day),
            format!("[{}] Queue backlog on {}", server.tenant, server.name),
            format!(
                "{} messages are waiting on {}, above the threshold of {}.",
                messages, server.name, backlog_threshold
            ),
        ));
    }

    for node in nodes.iter().filter(|n| !n.running) {
        alerts.push((
            format!("node_down:{}:{}", node.name, day),
            format!("[{}] Node {} is down", server.tenant, node.name),
            format!("Node {} of {} is not running.", node.name, server.name),
        ));
    }

    alerts
}

#[async_trait]
impl Monitor for BrokerMonitor {
    type Target = BrokerServer;

    fn name(&self) -> &str {
        "broker_alerts"
    }

    fn target_id(&self, server: &BrokerServer) -> String {
        server.id.clone()
    }

    async fn fetch_targets(&self) -> Result<Vec<BrokerServer>, SchedulerError> {
        self.ctx.store.servers().await
    }

    async fn process(&self, server: BrokerServer) -> Result<SideEffectOutcome, ItemError> {
        let overview: BrokerOverview = self.get(&server, "overview").await?;
        let nodes: Vec<NodeStatus> = self.get(&server, "nodes").await?;

        debug!(
            server = %server.id,
            messages = overview.queue_totals.messages,
            nodes = nodes.len(),
            version = overview.broker_version.as_deref().unwrap_or("unknown"),
            "broker overview"
        );

        let alerts = broker_alerts(
            &server,
            &overview,
            &nodes,
            self.backlog_threshold,
            Utc::now().date_naive(),
        );

        let mut outcome = SideEffectOutcome::NotApplicable;
        for (kind, subject, body) in alerts {
            let sent = self.alert(&server, kind, subject, body).await?;
            outcome = outcome.merge(sent);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::monitors::testing::{RecordingNotifier, context};

    fn server(uri: &str) -> BrokerServer {
        BrokerServer {
            id: "srv-1".to_string(),
            tenant: "acme".to_string(),
            name: "prod".to_string(),
            management_url: uri.to_string(),
            username: Some("monitor".to_string()),
            password: Some("secret".to_string()),
            version: None,
        }
    }

    fn overview(messages: u64) -> BrokerOverview {
        BrokerOverview {
            queue_totals: QueueTotals { messages },
            broker_version: None,
        }
    }

    #[test]
    fn test_alerts_for_backlog_and_down_nodes() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let nodes = vec![
            NodeStatus {
                name: "rabbit@a".to_string(),
                running: true,
            },
            NodeStatus {
                name: "rabbit@b".to_string(),
                running: false,
            },
        ];

        let alerts = broker_alerts(&server("http://x"), &overview(12_000), &nodes, 10_000, day);
        let kinds: Vec<&str> = alerts.iter().map(|(k, _, _)| k.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["queue_backlog:2026-10-19", "node_down:rabbit@b:2026-10-19"]
        );

        let quiet = broker_alerts(&server("http://x"), &overview(10_000), &[], 10_000, day);
        assert!(quiet.is_empty());
    }

    #[tokio::test]
    async fn test_process_alerts_once_per_day() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/overview"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "queue_totals": {"messages": 50_000},
                "broker_version": "3.12.1"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "rabbit@a", "running": false}
            ])))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(
            dir.path(),
            serde_json::json!({"servers": []}),
            Arc::clone(&notifier),
        )
        .await;
        let monitor = BrokerMonitor::new(ctx, 10_000);

        let first = monitor.process(server(&mock_server.uri())).await.unwrap();
        let second = monitor.process(server(&mock_server.uri())).await.unwrap();

        assert_eq!(first, SideEffectOutcome::Sent);
        assert_eq!(second, SideEffectOutcome::AlreadySent);
        assert_eq!(
            notifier.subjects(),
            vec![
                "[acme] Queue backlog on prod".to_string(),
                "[acme] Node rabbit@a is down".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_is_item_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(dir.path(), serde_json::json!({}), Arc::clone(&notifier)).await;
        let monitor = BrokerMonitor::new(ctx, 10_000);

        let err = monitor
            .process(server(&mock_server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(notifier.subjects().is_empty());
    }
}
