use job_registry::{JobRegistry, JobStatus, JobUpdate, NewJob, RegistryError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::transcription_runner::{JobTicket, TranscriptionRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub source_url: String,
    pub language: String,
    pub email: Option<String>,
    pub compress: bool,
}

/// A job that has been registered and handed to a background task.
pub struct DispatchedJob {
    pub job_id: String,
    /// Resolves once the job has reached a terminal state. Dropping it leaves
    /// the job running.
    pub task: JoinHandle<()>,
}

pub struct JobDispatcher {
    registry: Arc<JobRegistry>,
    runner: Arc<TranscriptionRunner>,
}

impl JobDispatcher {
    pub const fn new(registry: Arc<JobRegistry>, runner: Arc<TranscriptionRunner>) -> Self {
        Self { registry, runner }
    }

    pub const fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub async fn dispatch_job(&self, request: JobRequest) -> DispatchedJob {
        let job_id = self
            .registry
            .create(NewJob {
                source_url: request.source_url.clone(),
                language: request.language.clone(),
                email: request.email,
            })
            .await;
        info!("Dispatching transcription job {}", job_id);

        let ticket = JobTicket {
            job_id: job_id.clone(),
            source_url: request.source_url,
            language: request.language,
            compress: request.compress,
        };
        let runner = self.runner.clone();
        let handle = tokio::spawn(async move { runner.run(ticket).await });

        // Supervise the runner so a panic still leaves the job in a terminal state
        let registry = self.registry.clone();
        let supervised_id = job_id.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("Transcription task for job {} aborted: {}", supervised_id, e);
                let reason = format!("Transcription task aborted: {e}");
                if let Err(e) = mark_aborted(&registry, &supervised_id, reason).await {
                    warn!("Could not mark job {} as failed: {}", supervised_id, e);
                }
            }
        });

        DispatchedJob { job_id, task }
    }
}

// Jobs only fail from processing, so a job that died before its first
// checkpoint is moved there first.
async fn mark_aborted(
    registry: &JobRegistry,
    job_id: &str,
    reason: String,
) -> Result<(), RegistryError> {
    let job = registry
        .get(job_id)
        .await
        .ok_or_else(|| RegistryError::NotFound(job_id.to_string()))?;
    if job.status == JobStatus::Queued {
        registry
            .update(job_id, JobUpdate::processing(job.progress, job.message))
            .await?;
    }
    registry.update(job_id, JobUpdate::failed(reason)).await?;
    Ok(())
}
