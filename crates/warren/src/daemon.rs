//! Daemon wiring: one cycle scheduler per monitor, sharing a store and notifier.

use std::sync::Arc;

use async_trait::async_trait;
use miette::Result;
use tokio::sync::watch;
use tracing::{error, info};

use warren_scheduler::{
    Clock, CycleScheduler, CycleSummary, ErrorClass, Monitor, Notifier, ResilientInvoker,
    SchedulerError, TokioClock,
};

use crate::config::DaemonConfig;
use crate::monitors::{BrokerMonitor, LicenseMonitor, MonitorContext, VersionMonitor};
use crate::notify::{LogNotifier, WebhookNotifier};
use crate::store::FileStore;

/// Uniform handle over schedulers of different monitor types.
#[async_trait]
trait Service: Send + Sync {
    fn name(&self) -> &str;
    fn start(&self) -> Result<bool, SchedulerError>;
    fn stop(&self) -> Result<bool, SchedulerError>;
    async fn trigger(&self) -> Option<CycleSummary>;
}

#[async_trait]
impl<M: Monitor> Service for CycleScheduler<M> {
    fn name(&self) -> &str {
        self.monitor().name()
    }

    fn start(&self) -> Result<bool, SchedulerError> {
        CycleScheduler::start(self)
    }

    fn stop(&self) -> Result<bool, SchedulerError> {
        CycleScheduler::stop(self)
    }

    async fn trigger(&self) -> Option<CycleSummary> {
        self.trigger_cycle().await
    }
}

/// Everything the daemon owns. Services hold clones of the store, so they are
/// stopped and dropped before it.
struct Runtime {
    store: Arc<FileStore>,
    services: Vec<Box<dyn Service>>,
}

async fn build(config: &DaemonConfig) -> Result<Runtime, SchedulerError> {
    let store = Arc::new(
        FileStore::open(
            &config.store_path,
            &config.ledger_path,
            config.marker_retention,
        )
        .await?,
    );
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let invoker = ResilientInvoker::new(Arc::clone(&clock));
    let client = reqwest::Client::builder()
        .user_agent(concat!("warren/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            SchedulerError::InvalidConfig(format!("failed to build HTTP client: {}", e))
        })?;

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => {
            info!(url = %url, "delivering notifications to webhook");
            Arc::new(WebhookNotifier::new(
                client.clone(),
                url.clone(),
                invoker.clone(),
                config.notify_policy,
            ))
        }
        None => {
            info!("no webhook configured, notifications will be logged");
            Arc::new(LogNotifier)
        }
    };

    let ctx = MonitorContext {
        store: Arc::clone(&store),
        notifier,
        client,
        invoker,
        policy: config.check_policy,
    };

    let mut services: Vec<Box<dyn Service>> = vec![
        Box::new(CycleScheduler::new(
            BrokerMonitor::new(ctx.clone(), config.queue_backlog_threshold),
            config.broker,
            Arc::clone(&clock),
        )?),
        Box::new(CycleScheduler::new(
            LicenseMonitor::new(ctx.clone(), config.reminder_days.clone()),
            config.license,
            Arc::clone(&clock),
        )?),
    ];

    match &config.version_endpoint {
        Some(endpoint) => {
            let version_ctx = MonitorContext {
                policy: config.check_policy.with_error_class(ErrorClass::Generic),
                ..ctx
            };
            services.push(Box::new(CycleScheduler::new(
                VersionMonitor::new(version_ctx, endpoint.clone()),
                config.version,
                clock,
            )?));
        }
        None => info!("no version endpoint configured, version checks disabled"),
    }

    Ok(Runtime { store, services })
}

/// Run all monitors until ctrl-c.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let runtime = build(&config)
        .await
        .map_err(|e| miette::miette!("failed to start daemon: {}", e))?;

    for service in &runtime.services {
        service
            .start()
            .map_err(|e| miette::miette!("failed to start {}: {}", service.name(), e))?;
    }
    info!(monitors = runtime.services.len(), "daemon started");

    // Create shutdown channel
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });
    let _ = shutdown_rx.wait_for(|stop| *stop).await;

    shutdown(runtime).await;
    Ok(())
}

/// Run one cycle of every monitor and return the summaries.
pub async fn check_once(config: DaemonConfig) -> Result<Vec<CycleSummary>> {
    let runtime = build(&config)
        .await
        .map_err(|e| miette::miette!("failed to set up monitors: {}", e))?;

    let mut summaries = Vec::with_capacity(runtime.services.len());
    for service in &runtime.services {
        match service.trigger().await {
            Some(summary) => summaries.push(summary),
            None => info!(monitor = service.name(), "cycle skipped"),
        }
    }

    shutdown(runtime).await;
    Ok(summaries)
}

async fn shutdown(runtime: Runtime) {
    let Runtime { store, services } = runtime;

    for service in &services {
        if let Err(e) = service.stop() {
            error!(monitor = service.name(), error = %e, "failed to stop scheduler");
        }
    }
    drop(services);

    info!(markers = store.marker_count().await, "shutdown complete");
}
