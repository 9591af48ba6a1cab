//! New broker release notifications.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use warren_scheduler::{
    ItemError, Monitor, Notification, SchedulerError, SideEffectKey, SideEffectOutcome,
};

use super::MonitorContext;
use crate::http;
use crate::store::BrokerServer;

/// Response of the release endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub latest_version: String,
    #[serde(default)]
    pub release_notes_url: Option<String>,
}

/// Compare dotted version strings numerically (`3.10.0` > `3.9.2`).
///
/// A leading `v` is ignored, missing components count as zero and a
/// non-numeric component compares as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn parts(v: &str) -> Vec<u64> {
        v.trim()
            .trim_start_matches('v')
            .split(['.', '-', '+'])
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    }

    let (a, b) = (parts(a), parts(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub struct VersionMonitor {
    ctx: MonitorContext,
    endpoint: String,
}

impl VersionMonitor {
    pub fn new(ctx: MonitorContext, endpoint: impl Into<String>) -> Self {
        Self {
            ctx,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Monitor for VersionMonitor {
    type Target = BrokerServer;

    fn name(&self) -> &str {
        "version_check"
    }

    fn target_id(&self, server: &BrokerServer) -> String {
        server.id.clone()
    }

    async fn fetch_targets(&self) -> Result<Vec<BrokerServer>, SchedulerError> {
        let servers = self.ctx.store.servers().await?;
        Ok(servers.into_iter().filter(|s| s.version.is_some()).collect())
    }

    async fn process(&self, server: BrokerServer) -> Result<SideEffectOutcome, ItemError> {
        let Some(current) = server.version.as_deref() else {
            return Ok(SideEffectOutcome::NotApplicable);
        };

        let release: ReleaseInfo = self
            .ctx
            .invoker
            .invoke(&self.ctx.policy, || {
                http::send_json(
                    self.ctx
                        .client
                        .get(&self.endpoint)
                        .query(&[("product", "broker"), ("current", current)]),
                )
            })
            .await?;

        if compare_versions(&release.latest_version, current) != Ordering::Greater {
            debug!(server = %server.id, current, "broker is up to date");
            return Ok(SideEffectOutcome::NotApplicable);
        }

        let mut body = format!(
            "{} is running {}; version {} is available.",
            server.name, current, release.latest_version
        );
        if let Some(url) = &release.release_notes_url {
            body.push_str(&format!(" Release notes: {}", url));
        }
        let notification = Notification {
            source: self.name().to_string(),
            target_id: server.id.clone(),
            subject: format!(
                "[{}] Broker {} is available for {}",
                server.tenant, release.latest_version, server.name
            ),
            body,
        };

        let key = SideEffectKey::new(server.id, format!("update:{}", release.latest_version));
        Ok(self.ctx.dispatch(&key, &notification).await?)
    }
}
