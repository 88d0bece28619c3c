use chrono::{TimeDelta, Utc};
use job_registry::JobRegistry;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Drops finished jobs older than `retention` along with their result files.
/// Returns how many jobs were evicted.
pub async fn sweep_expired_jobs(registry: &JobRegistry, retention: Duration) -> usize {
    let Ok(retention) = TimeDelta::from_std(retention) else {
        warn!("Retention period {:?} is out of range, skipping sweep", retention);
        return 0;
    };
    let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
        return 0;
    };

    let evicted = registry.evict_finished_before(cutoff).await;
    for job in &evicted {
        let Some(file_path) = job.file_path.as_deref() else {
            continue;
        };
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => debug!("Removed result file {} for job {}", file_path, job.id),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove result file {}: {}", file_path, e),
        }
    }

    evicted.len()
}

pub fn spawn_retention_sweeper(
    registry: Arc<JobRegistry>,
    retention: Duration,
    every: Duration,
) -> JoinHandle<()> {
    info!(
        "Evicting finished jobs after {:?}, checking every {:?}",
        retention, every
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sweep_expired_jobs(&registry, retention).await;
            if evicted > 0 {
                info!("Retention sweep evicted {} jobs", evicted);
            }
        }
    })
}
