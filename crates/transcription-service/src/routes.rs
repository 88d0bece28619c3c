use axum::{
    Router,
    routing::{get, post},
};
use job_registry::JobRegistry;
use std::sync::Arc;
use tracing::info;
use transcription_runner::{JobDispatcher, RunnerConfig, TranscriptionProgram, TranscriptionRunner};

use crate::config::ServiceConfig;
use crate::handlers::health::health_check;
use crate::handlers::jobs::{download_transcript, get_job_status, submit_transcription};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub dispatcher: Arc<JobDispatcher>,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        program: Arc<dyn TranscriptionProgram>,
        runner_config: RunnerConfig,
    ) -> Self {
        let runner = Arc::new(TranscriptionRunner::new(
            registry.clone(),
            program,
            runner_config,
        ));
        let dispatcher = Arc::new(JobDispatcher::new(registry.clone(), runner));
        Self {
            registry,
            dispatcher,
        }
    }

    /// Opens the job registry and wires the external transcription program.
    pub async fn from_config(config: &ServiceConfig) -> Self {
        let registry = Arc::new(JobRegistry::open(config.jobs_file.clone()).await);
        info!(
            "Loaded {} jobs from {}",
            registry.len().await,
            config.jobs_file.display()
        );
        Self::new(
            registry,
            Arc::new(config.external_program()),
            config.runner_config(),
        )
    }
}

pub fn create_router(state: AppState) -> Router {
    info!("Setting up HTTP router");

    Router::new()
        .route("/transcribe", post(submit_transcription))
        .route("/status/{job_id}", get(get_job_status))
        .route("/download/{job_id}", get(download_transcript))
        .route("/health", get(health_check))
        .with_state(state)
}
