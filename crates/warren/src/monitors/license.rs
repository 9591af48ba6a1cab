//! License expiry reminders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warren_scheduler::{
    ItemError, Monitor, Notification, SchedulerError, SideEffectKey, SideEffectOutcome,
};

use super::MonitorContext;
use crate::store::License;

/// Where a license stands relative to the reminder thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
    /// More days left than the largest threshold.
    Valid,
    /// Inside the window of the given threshold (in days).
    ExpiresWithin(u32),
    Expired,
}

impl LicenseStatus {
    /// Marker kind, one per threshold and expiry date. A renewed license
    /// moves to a new date and is reminded again.
    fn kind(self, expires_at: DateTime<Utc>) -> Option<String> {
        let date = expires_at.date_naive();
        match self {
            LicenseStatus::Valid => None,
            LicenseStatus::ExpiresWithin(days) => Some(format!("expiry-{}d:{}", days, date)),
            LicenseStatus::Expired => Some(format!("expired:{}", date)),
        }
    }
}

/// Status of a license expiring at `expires_at`, seen at `now`.
///
/// The tightest threshold that still covers the remaining days wins, so a
/// license registered five days before expiry gets the 7-day reminder only.
pub fn license_status(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    reminder_days: &[u32],
) -> LicenseStatus {
    let remaining = expires_at - now;
    if remaining <= chrono::Duration::zero() {
        return LicenseStatus::Expired;
    }

    let days = remaining.num_days();
    reminder_days
        .iter()
        .copied()
        .filter(|t| days < i64::from(*t))
        .min()
        .map_or(LicenseStatus::Valid, LicenseStatus::ExpiresWithin)
}

pub struct LicenseMonitor {
    ctx: MonitorContext,
    reminder_days: Vec<u32>,
}

impl LicenseMonitor {
    pub fn new(ctx: MonitorContext, reminder_days: Vec<u32>) -> Self {
        Self { ctx, reminder_days }
    }
}

#[async_trait]
impl Monitor for LicenseMonitor {
    type Target = License;

    fn name(&self) -> &str {
        "license_expiry"
    }

    fn target_id(&self, license: &License) -> String {
        license.id.clone()
    }

    async fn fetch_targets(&self) -> Result<Vec<License>, SchedulerError> {
        self.ctx.store.licenses().await
    }

    async fn process(&self, license: License) -> Result<SideEffectOutcome, ItemError> {
        let status = license_status(license.expires_at, Utc::now(), &self.reminder_days);
        let Some(kind) = status.kind(license.expires_at) else {
            return Ok(SideEffectOutcome::NotApplicable);
        };

        let subject = match status {
            LicenseStatus::Expired => {
                format!("[{}] Your Warren license has expired", license.tenant)
            }
            _ => format!(
                "[{}] Your Warren license expires on {}",
                license.tenant,
                license.expires_at.format("%Y-%m-%d")
            ),
        };
        let notification = Notification {
            source: self.name().to_string(),
            target_id: license.id.clone(),
            subject,
            body: format!(
                "License {} for {} ({}) expires at {}.",
                license.id,
                license.tenant,
                license.contact_email,
                license.expires_at.to_rfc3339()
            ),
        };

        let key = SideEffectKey::new(license.id, kind);
        Ok(self.ctx.dispatch(&key, &notification).await?)
    }
}
