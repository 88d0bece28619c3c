use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::RegistryError;
use crate::models::{JobRecord, JobUpdate, NewJob};

#[derive(Debug, Error)]
enum SnapshotError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Format(#[from] serde_json::Error),
}

/// In-memory job table mirrored to a JSON snapshot file.
///
/// Every mutation takes the same lock and rewrites the snapshot before
/// releasing it, so writers from concurrent jobs are serialized and the file
/// always reflects the latest state. Snapshot failures are logged and never
/// undo the in-memory change.
pub struct JobRegistry {
    path: PathBuf,
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    /// Opens the registry backed by `path`, loading any existing snapshot.
    ///
    /// A missing snapshot starts an empty registry. So does an unreadable or
    /// corrupt one, after logging a warning.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let jobs = match load_snapshot(&path).await {
            Ok(Some(jobs)) => {
                info!("Loaded {} existing jobs from {}", jobs.len(), path.display());
                jobs
            }
            Ok(None) => {
                info!("No job snapshot at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => {
                warn!(
                    "Could not load job snapshot {}: {}. Starting empty",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        };

        Self {
            path,
            jobs: Mutex::new(jobs),
        }
    }

    /// Registers a new queued job and returns its id.
    pub async fn create(&self, job: NewJob) -> String {
        let mut jobs = self.jobs.lock().await;

        let mut job_id = Uuid::new_v4().to_string();
        while jobs.contains_key(&job_id) {
            job_id = Uuid::new_v4().to_string();
        }

        let record = JobRecord::new(job_id.clone(), job, Utc::now());
        jobs.insert(job_id.clone(), record);
        self.persist(&jobs).await;

        debug!("Registered job {}", job_id);
        job_id
    }

    pub async fn update(
        &self,
        job_id: &str,
        update: JobUpdate,
    ) -> Result<JobRecord, RegistryError> {
        let mut jobs = self.jobs.lock().await;

        let record = jobs
            .get_mut(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.to_string()))?;
        record.apply(update, Utc::now())?;
        let updated = record.clone();

        self.persist(&jobs).await;
        Ok(updated)
    }

    pub async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> HashMap<String, JobRecord> {
        self.jobs.lock().await.clone()
    }

    /// Removes terminal jobs last touched before `cutoff` and returns them.
    ///
    /// Queued and processing jobs are kept regardless of age.
    pub async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<JobRecord> {
        let mut jobs = self.jobs.lock().await;

        let expired: Vec<String> = jobs
            .values()
            .filter(|job| job.status.is_terminal() && job.updated_at < cutoff)
            .map(|job| job.id.clone())
            .collect();
        if expired.is_empty() {
            return Vec::new();
        }

        let removed: Vec<JobRecord> = expired.iter().filter_map(|id| jobs.remove(id)).collect();
        self.persist(&jobs).await;

        info!("Evicted {} finished jobs", removed.len());
        removed
    }

    async fn persist(&self, jobs: &HashMap<String, JobRecord>) {
        if let Err(e) = write_snapshot(&self.path, jobs).await {
            warn!("Error saving jobs to {}: {}", self.path.display(), e);
        }
    }
}

async fn load_snapshot(path: &Path) -> Result<Option<HashMap<String, JobRecord>>, SnapshotError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_slice(&bytes)?))
}

// Written to a sibling file first so a crash mid-write never truncates the
// previous snapshot.
async fn write_snapshot(
    path: &Path,
    jobs: &HashMap<String, JobRecord>,
) -> Result<(), SnapshotError> {
    let bytes = serde_json::to_vec_pretty(jobs)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(path);
    fs::write(&staging, bytes).await?;
    fs::rename(&staging, path).await?;

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
