//! Scheduled refresh of the allocation snapshot.
//!
//! Data acquisition is delegated to an external scraping collaborator behind
//! the narrow [`MetricsCollector`] boundary; this module only consumes its
//! raw payload, re-derives the school/user allocation, and persists the
//! latest snapshot. A failed run leaves the previous snapshot intact.

pub mod retry;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::allocation::{RawMetrics, SchoolDirectory, Snapshot, UNALLOCATED_SCHOOL_ID, allocate};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::store::Store;

/// The refresh job runs once every 24 hours.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const FETCH_RETRIES: u32 = 3;
const FETCH_BASE_DELAY: Duration = Duration::from_secs(1);

/// Boundary to the external scraping collaborator. Everything behind this
/// trait is uncontrolled UI coupling; the rest of the system only sees the
/// raw payload.
pub trait MetricsCollector: Send + Sync {
    fn fetch_raw_metrics(&self) -> Result<RawMetrics>;
}

/// Reads the raw payload the external scraper drops on disk.
pub struct FileCollector {
    path: PathBuf,
}

impl FileCollector {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl MetricsCollector for FileCollector {
    fn fetch_raw_metrics(&self) -> Result<RawMetrics> {
        if !self.path.exists() {
            return Err(Error::NotFound(format!(
                "raw metrics payload not found at {}",
                self.path.display()
            )));
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RefreshSummary {
    pub schools: usize,
    pub allocated: usize,
    pub unallocated: usize,
}

/// One refresh run: fetch the raw payload, re-derive the allocation from the
/// schools reference table, fill used-license counts from the ledger, and
/// overwrite the latest snapshot.
pub async fn run_refresh(
    collector: &dyn MetricsCollector,
    schools_csv: &Path,
    snapshot_path: &Path,
    store: Option<&dyn Store>,
) -> Result<RefreshSummary> {
    let metrics = retry::with_backoff(FETCH_RETRIES, FETCH_BASE_DELAY, || async {
        collector.fetch_raw_metrics()
    })
    .await?;
    info!("raw payload fetched: {} users", metrics.users.len());

    let directory = SchoolDirectory::from_csv_path(schools_csv)?;
    let mut snapshot = allocate(&metrics, &directory);

    if let Some(store) = store {
        for alloc in &mut snapshot.schools_allocation {
            if alloc.school_id == UNALLOCATED_SCHOOL_ID {
                continue;
            }
            match store.school_used_count(&alloc.school_id) {
                Ok(used) => alloc.total_licenses = used,
                Err(e) => tracing::warn!(
                    "could not read used count for school {}: {e}",
                    alloc.school_id
                ),
            }
        }
    }

    write_snapshot(snapshot_path, &snapshot)?;

    let allocated = metrics.users.len() - snapshot.unallocated_users_count;
    Ok(RefreshSummary {
        schools: directory.len(),
        allocated,
        unallocated: snapshot.unallocated_users_count,
    })
}

/// Write-to-temp then rename, so an interrupted write never corrupts the
/// previous snapshot.
fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Spawns the daily refresh task. Runs are sequential on one task, so the
/// job never overlaps itself.
pub fn spawn_daily(store: Arc<dyn Store>, config: ServerConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        // the first tick completes immediately; wait a full period instead
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let collector = FileCollector::new(config.raw_metrics_path());
            match run_refresh(
                &collector,
                &config.schools_csv_path(),
                &config.snapshot_path(),
                Some(store.as_ref()),
            )
            .await
            {
                Ok(summary) => info!(
                    "daily refresh complete: {} schools, {} allocated, {} unallocated",
                    summary.schools, summary.allocated, summary.unallocated
                ),
                Err(e) => error!("daily refresh failed, previous snapshot kept: {e}"),
            }
        }
    })
}
