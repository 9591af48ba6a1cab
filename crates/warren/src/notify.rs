//! Notification delivery.

use async_trait::async_trait;
use tracing::{info, warn};

use warren_scheduler::{Notification, Notifier, ResilientInvoker, RetryPolicy, SendReport};

use crate::http;

/// Posts notifications as JSON to a webhook (mail relay, chat hook, alert sink).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    invoker: ResilientInvoker,
    policy: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        invoker: ResilientInvoker,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            invoker,
            policy,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> SendReport {
        let result = self
            .invoker
            .invoke(&self.policy, || {
                http::send(self.client.post(&self.url).json(notification))
            })
            .await;

        match result {
            Ok(_) => SendReport::sent(),
            Err(e) => {
                warn!(
                    source = %notification.source,
                    target = %notification.target_id,
                    classification = e.kind(),
                    error = %e,
                    "webhook delivery failed"
                );
                SendReport::failed(e.to_string())
            }
        }
    }
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> SendReport {
        info!(
            source = %notification.source,
            target = %notification.target_id,
            subject = %notification.subject,
            body = %notification.body,
            "notification"
        );
        SendReport::sent()
    }
}
