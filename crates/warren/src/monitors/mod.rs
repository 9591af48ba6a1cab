//! Monitors run by the daemon.
//!
//! - `broker`: queue backlog and node health of registered broker servers
//! - `license`: expiry reminders for tenant licenses
//! - `version`: new broker releases for servers that report a version

mod broker;
mod license;
mod version;

use std::sync::Arc;

pub use broker::BrokerMonitor;
pub use license::LicenseMonitor;
pub use version::VersionMonitor;

use warren_scheduler::{
    Notification, Notifier, ResilientInvoker, RetryPolicy, SchedulerError, SideEffectKey,
    SideEffectOutcome, dispatch_once,
};

use crate::store::FileStore;

/// Collaborators shared by every monitor.
#[derive(Clone)]
pub struct MonitorContext {
    pub store: Arc<FileStore>,
    pub notifier: Arc<dyn Notifier>,
    pub client: reqwest::Client,
    pub invoker: ResilientInvoker,
    pub policy: RetryPolicy,
}

impl MonitorContext {
    /// Send `notification` unless the marker for `key` already exists.
    pub async fn dispatch(
        &self,
        key: &SideEffectKey,
        notification: &Notification,
    ) -> Result<SideEffectOutcome, SchedulerError> {
        dispatch_once(
            self.store.as_ref(),
            self.notifier.as_ref(),
            key,
            notification,
        )
        .await
    }
}
