//! File-backed persistence for monitor targets and side effect markers.
//!
//! Targets are read fresh from a JSON file on every fetch so that edits made by
//! the dashboard are picked up by the next cycle. Markers are kept in memory
//! and rewritten to their own file after every insert. Each marker carries the
//! time it was recorded, and markers older than the retention window are
//! dropped when the store opens and on every insert.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use warren_scheduler::{SchedulerError, SideEffectKey, SideEffectLedger};

/// A broker server registered by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerServer {
    pub id: String,
    pub tenant: String,
    pub name: String,
    /// Base URL of the broker's management API.
    pub management_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Broker version last reported for this server.
    #[serde(default)]
    pub version: Option<String>,
}

/// A software license issued to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub tenant: String,
    pub contact_email: String,
    pub expires_at: DateTime<Utc>,
}

/// On-disk shape of the targets file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TargetFile {
    #[serde(default)]
    pub servers: Vec<BrokerServer>,
    #[serde(default)]
    pub licenses: Vec<License>,
}

/// On-disk shape of one side effect marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkerRecord {
    #[serde(flatten)]
    key: SideEffectKey,
    recorded_at: DateTime<Utc>,
}

type Markers = BTreeMap<SideEffectKey, DateTime<Utc>>;

/// JSON file persistence collaborator.
pub struct FileStore {
    targets_path: PathBuf,
    ledger_path: PathBuf,
    retention: chrono::Duration,
    markers: Mutex<Markers>,
}

/// Drop markers recorded before `cutoff`, returning how many were dropped.
fn prune(markers: &mut Markers, cutoff: DateTime<Utc>) -> usize {
    let before = markers.len();
    markers.retain(|_, recorded_at| *recorded_at >= cutoff);
    before - markers.len()
}

impl FileStore {
    /// Open the store, loading existing markers if the ledger file exists.
    ///
    /// Markers older than `retention` are pruned and the ledger rewritten.
    pub async fn open(
        targets_path: impl Into<PathBuf>,
        ledger_path: impl Into<PathBuf>,
        retention: Duration,
    ) -> Result<Self, SchedulerError> {
        let targets_path = targets_path.into();
        let ledger_path = ledger_path.into();
        let retention = chrono::Duration::from_std(retention).map_err(|_| {
            SchedulerError::InvalidConfig(format!(
                "marker retention of {}s is out of range",
                retention.as_secs()
            ))
        })?;

        let mut markers = match tokio::fs::read(&ledger_path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<MarkerRecord>>(&bytes)?
                .into_iter()
                .map(|record| (record.key, record.recorded_at))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Markers::new(),
            Err(e) => {
                return Err(SchedulerError::Ledger(format!(
                    "failed to read {}: {}",
                    ledger_path.display(),
                    e
                )));
            }
        };

        let pruned = prune(&mut markers, Utc::now() - retention);

        info!(
            targets = %targets_path.display(),
            ledger = %ledger_path.display(),
            markers = markers.len(),
            pruned,
            "opened file store"
        );

        let store = Self {
            targets_path,
            ledger_path,
            retention,
            markers: Mutex::new(markers),
        };
        if pruned > 0 {
            store.persist(&*store.markers.lock().await).await?;
        }
        Ok(store)
    }

    async fn load_targets(&self) -> Result<TargetFile, SchedulerError> {
        let bytes = tokio::fs::read(&self.targets_path).await.map_err(|e| {
            SchedulerError::FetchTargets(format!(
                "failed to read {}: {}",
                self.targets_path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Current broker servers.
    pub async fn servers(&self) -> Result<Vec<BrokerServer>, SchedulerError> {
        Ok(self.load_targets().await?.servers)
    }

    /// Current licenses.
    pub async fn licenses(&self) -> Result<Vec<License>, SchedulerError> {
        Ok(self.load_targets().await?.licenses)
    }

    /// Number of markers recorded so far.
    pub async fn marker_count(&self) -> usize {
        self.markers.lock().await.len()
    }

    async fn persist(&self, markers: &Markers) -> Result<(), SchedulerError> {
        if let Some(parent) = self.ledger_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        }

        // Write to a sibling file and rename so a crash never leaves a torn ledger
        let tmp_path = self.ledger_path.with_extension("json.tmp");
        let records: Vec<MarkerRecord> = markers
            .iter()
            .map(|(key, recorded_at)| MarkerRecord {
                key: key.clone(),
                recorded_at: *recorded_at,
            })
            .collect();
        let json = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &self.ledger_path)
            .await
            .map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SideEffectLedger for FileStore {
    async fn has_side_effect(&self, key: &SideEffectKey) -> Result<bool, SchedulerError> {
        let cutoff = Utc::now() - self.retention;
        let markers = self.markers.lock().await;
        Ok(markers.get(key).is_some_and(|recorded_at| *recorded_at >= cutoff))
    }

    async fn record_side_effect(&self, key: &SideEffectKey) -> Result<bool, SchedulerError> {
        let now = Utc::now();
        // The lock is held across the write so check-and-insert is atomic
        let mut markers = self.markers.lock().await;
        let pruned = prune(&mut markers, now - self.retention);
        if markers.contains_key(key) {
            return Ok(false);
        }
        if pruned > 0 {
            debug!(pruned, "pruned expired side effect markers");
        }
        markers.insert(key.clone(), now);
        if let Err(e) = self.persist(&markers).await {
            markers.remove(key);
            return Err(e);
        }
        debug!(key = %key, "recorded side effect marker");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    fn sample_targets() -> serde_json::Value {
        serde_json::json!({
            "servers": [{
                "id": "srv-1",
                "tenant": "acme",
                "name": "prod",
                "management_url": "http://localhost:15672",
                "version": "3.12.1"
            }],
            "licenses": [{
                "id": "lic-1",
                "tenant": "acme",
                "contact_email": "ops@acme.test",
                "expires_at": "2026-11-01T00:00:00Z"
            }]
        })
    }

    #[tokio::test]
    async fn test_reads_targets() {
        let dir = tempfile::tempdir().unwrap();
        let targets = dir.path().join("targets.json");
        std::fs::write(&targets, sample_targets().to_string()).unwrap();

        let store = FileStore::open(&targets, dir.path().join("markers.json"), RETENTION)
            .await
            .unwrap();

        let servers = store.servers().await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].version.as_deref(), Some("3.12.1"));
        assert_eq!(servers[0].username, None);

        let licenses = store.licenses().await.unwrap();
        assert_eq!(licenses[0].contact_email, "ops@acme.test");
    }

    #[tokio::test]
    async fn test_missing_targets_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(
            dir.path().join("nope.json"),
            dir.path().join("m.json"),
            RETENTION,
        )
        .await
        .unwrap();
        assert!(matches!(
            store.servers().await,
            Err(SchedulerError::FetchTargets(_))
        ));
    }

    #[tokio::test]
    async fn test_markers_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let targets = dir.path().join("targets.json");
        let ledger = dir.path().join("state").join("markers.json");
        let key = SideEffectKey::new("lic-1", "expiry-7d:2026-11-01");

        {
            let store = FileStore::open(&targets, &ledger, RETENTION).await.unwrap();
            assert!(!store.has_side_effect(&key).await.unwrap());
            assert!(store.record_side_effect(&key).await.unwrap());
            assert!(!store.record_side_effect(&key).await.unwrap());
        }

        let store = FileStore::open(&targets, &ledger, RETENTION).await.unwrap();
        assert!(store.has_side_effect(&key).await.unwrap());
        assert_eq!(store.marker_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_markers_are_pruned_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("markers.json");
        let now = Utc::now();
        std::fs::write(
            &ledger,
            serde_json::json!([
                {
                    "target_id": "srv-1",
                    "kind": "queue_backlog:2026-08-01",
                    "recorded_at": now - chrono::Duration::days(60)
                },
                {
                    "target_id": "srv-1",
                    "kind": "node_down:rabbit@a:2026-10-18",
                    "recorded_at": now - chrono::Duration::days(1)
                }
            ])
            .to_string(),
        )
        .unwrap();

        let stale = SideEffectKey::new("srv-1", "queue_backlog:2026-08-01");
        let fresh = SideEffectKey::new("srv-1", "node_down:rabbit@a:2026-10-18");

        let store = FileStore::open(dir.path().join("targets.json"), &ledger, RETENTION)
            .await
            .unwrap();
        assert_eq!(store.marker_count().await, 1);
        assert!(!store.has_side_effect(&stale).await.unwrap());
        assert!(store.has_side_effect(&fresh).await.unwrap());

        let on_disk: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(&ledger).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0]["kind"], "node_down:rabbit@a:2026-10-18");

        // Retention is applied again while running
        let short = FileStore::open(
            dir.path().join("targets.json"),
            &ledger,
            Duration::from_secs(60 * 60),
        )
        .await
        .unwrap();
        assert_eq!(short.marker_count().await, 0);
        assert!(short.record_side_effect(&fresh).await.unwrap());
        assert!(!short.record_side_effect(&fresh).await.unwrap());
    }
}
