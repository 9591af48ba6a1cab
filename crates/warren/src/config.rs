//! Daemon configuration from CLI flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use warren_scheduler::{ErrorClass, RetryPolicy, SchedulerConfig, SchedulerError};

/// Default broker check interval in seconds.
const DEFAULT_BROKER_INTERVAL: u64 = 60;

/// Default license check interval in seconds (1 hour).
const DEFAULT_LICENSE_INTERVAL: u64 = 3600;

/// Default version check interval in seconds (6 hours).
const DEFAULT_VERSION_INTERVAL: u64 = 21600;

/// Default age in days after which side effect markers are dropped.
const DEFAULT_MARKER_RETENTION_DAYS: u64 = 90;

/// Flags shared by every command that runs monitors.
#[derive(Debug, Clone, Args)]
pub struct MonitorArgs {
    /// Targets file (broker servers and licenses)
    #[arg(long, env = "WARREN_STORE_PATH")]
    pub store_path: PathBuf,

    /// Side effect marker file (defaults to the user data directory)
    #[arg(long, env = "WARREN_LEDGER_PATH")]
    pub ledger_path: Option<PathBuf>,

    /// Days a side effect marker is kept before it is pruned
    #[arg(long, env = "WARREN_MARKER_RETENTION_DAYS", default_value_t = DEFAULT_MARKER_RETENTION_DAYS)]
    pub marker_retention_days: u64,

    /// Broker alert check interval in seconds
    #[arg(long, env = "WARREN_BROKER_INTERVAL", default_value_t = DEFAULT_BROKER_INTERVAL)]
    pub broker_interval: u64,

    /// License expiry check interval in seconds
    #[arg(long, env = "WARREN_LICENSE_INTERVAL", default_value_t = DEFAULT_LICENSE_INTERVAL)]
    pub license_interval: u64,

    /// Version check interval in seconds
    #[arg(long, env = "WARREN_VERSION_INTERVAL", default_value_t = DEFAULT_VERSION_INTERVAL)]
    pub version_interval: u64,

    /// Targets checked concurrently per cycle
    #[arg(long, env = "WARREN_CONCURRENCY", default_value_t = 5)]
    pub concurrency: usize,

    /// Retries after the first attempt of an outbound call
    #[arg(long, env = "WARREN_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds (doubles per retry)
    #[arg(long, env = "WARREN_BASE_DELAY_MS", default_value_t = 1000)]
    pub base_delay_ms: u64,

    /// Deadline for a single attempt in milliseconds
    #[arg(long, env = "WARREN_ATTEMPT_TIMEOUT_MS", default_value_t = 10000)]
    pub attempt_timeout_ms: u64,

    /// Webhook receiving notifications; notifications are logged when unset
    #[arg(long, env = "WARREN_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Classifier for webhook failures (generic, payment, integration)
    #[arg(long, env = "WARREN_WEBHOOK_ERROR_CLASS", default_value = "integration")]
    pub webhook_error_class: ErrorClass,

    /// Latest-release endpoint; the version monitor is disabled when unset
    #[arg(long, env = "WARREN_VERSION_ENDPOINT")]
    pub version_endpoint: Option<String>,

    /// License reminder thresholds in days
    #[arg(
        long,
        env = "WARREN_REMINDER_DAYS",
        value_delimiter = ',',
        default_value = "30,7,1"
    )]
    pub reminder_days: Vec<u32>,

    /// Queued messages above which a broker raises a backlog alert
    #[arg(long, env = "WARREN_QUEUE_BACKLOG_THRESHOLD", default_value_t = 10000)]
    pub queue_backlog_threshold: u64,
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub store_path: PathBuf,
    pub ledger_path: PathBuf,
    /// Markers older than this are pruned from the ledger.
    pub marker_retention: Duration,
    pub broker: SchedulerConfig,
    pub license: SchedulerConfig,
    pub version: SchedulerConfig,
    /// Policy for calls to broker management APIs and release endpoints.
    pub check_policy: RetryPolicy,
    /// Policy for webhook deliveries.
    pub notify_policy: RetryPolicy,
    pub webhook_url: Option<String>,
    pub version_endpoint: Option<String>,
    /// Thresholds, largest first, without duplicates.
    pub reminder_days: Vec<u32>,
    pub queue_backlog_threshold: u64,
}

impl DaemonConfig {
    pub fn from_args(args: MonitorArgs) -> Result<Self, SchedulerError> {
        let scheduler = |secs: u64| SchedulerConfig::new(Duration::from_secs(secs), args.concurrency);

        let check_policy = RetryPolicy::new(
            args.max_retries,
            Duration::from_millis(args.base_delay_ms),
            Duration::from_millis(args.attempt_timeout_ms),
            ErrorClass::Integration,
        )?;
        let notify_policy = check_policy.with_error_class(args.webhook_error_class);

        let mut reminder_days = args.reminder_days.clone();
        reminder_days.sort_unstable_by(|a, b| b.cmp(a));
        reminder_days.dedup();
        if reminder_days.is_empty() || reminder_days.contains(&0) {
            return Err(SchedulerError::InvalidConfig(
                "reminder days must be a non-empty list of positive numbers".to_string(),
            ));
        }

        // A pruned reminder marker inside its own window would be sent again
        let widest_reminder = u64::from(reminder_days[0]);
        if args.marker_retention_days <= widest_reminder {
            return Err(SchedulerError::InvalidConfig(format!(
                "marker retention must be longer than the widest reminder ({} days)",
                widest_reminder
            )));
        }

        let ledger_path = match args.ledger_path.clone() {
            Some(path) => path,
            None => default_ledger_path()?,
        };

        Ok(Self {
            broker: scheduler(args.broker_interval)?,
            license: scheduler(args.license_interval)?,
            version: scheduler(args.version_interval)?,
            store_path: args.store_path,
            ledger_path,
            marker_retention: Duration::from_secs(
                args.marker_retention_days.saturating_mul(24 * 60 * 60),
            ),
            check_policy,
            notify_policy,
            webhook_url: args.webhook_url.filter(|u| !u.is_empty()),
            version_endpoint: args.version_endpoint.filter(|u| !u.is_empty()),
            reminder_days,
            queue_backlog_threshold: args.queue_backlog_threshold,
        })
    }
}

fn default_ledger_path() -> Result<PathBuf, SchedulerError> {
    dirs::data_dir()
        .map(|dir| dir.join("warren").join("markers.json"))
        .ok_or_else(|| {
            SchedulerError::InvalidConfig(
                "no data directory available, pass --ledger-path".to_string(),
            )
        })
}
