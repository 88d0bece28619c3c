use job_registry::{JobRegistry, JobUpdate, RegistryError, Transcript};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::Builder;
use thiserror::Error;
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::metrics::{average_confidence, parse_duration};
use crate::program::transcription_program::{
    Invocation, ProgramError, ProgramOutput, TranscriptionProgram,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_TRANSCRIPT_FILE_NAME: &str = "tamil_transcription.txt";

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Where finished transcripts are kept, one `<job_id>.txt` per job.
    pub results_dir: PathBuf,
    /// Parent of the per-job working directories.
    pub work_root: PathBuf,
    /// Name of the file the delegated program writes on success.
    pub transcript_file_name: String,
    pub timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            work_root: PathBuf::from("work"),
            transcript_file_name: DEFAULT_TRANSCRIPT_FILE_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// What the runner needs to know about a job it is handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: String,
    pub source_url: String,
    pub language: String,
    pub compress: bool,
}

/// Why a job ended up failed. The `Display` text is what clients see.
#[derive(Debug, Error)]
pub enum JobFailure {
    #[error("Job registry rejected an update: {0}")]
    Registry(#[from] RegistryError),
    #[error("Could not prepare a working directory: {0}")]
    Workspace(std::io::Error),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),
    #[error("{}", describe_exit(*exit_code, stderr))]
    ProgramFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Transcription file not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("Could not store transcript: {0}")]
    Storage(#[from] std::io::Error),
}

fn describe_exit(exit_code: Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match (stderr.is_empty(), exit_code) {
        (false, _) => format!("Script failed: {stderr}"),
        (true, Some(code)) => format!("Script failed with exit code {code}"),
        (true, None) => "Script was terminated by a signal".to_string(),
    }
}

/// Drives a single job from queued to a terminal state.
pub struct TranscriptionRunner {
    registry: Arc<JobRegistry>,
    program: Arc<dyn TranscriptionProgram>,
    config: RunnerConfig,
}

impl TranscriptionRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        program: Arc<dyn TranscriptionProgram>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            registry,
            program,
            config,
        }
    }

    pub async fn run(&self, ticket: JobTicket) {
        info!(
            "Starting transcription job {} for {} ({})",
            ticket.job_id, ticket.source_url, ticket.language
        );

        let update = match self.transcribe(&ticket).await {
            Ok(transcript) => {
                info!(
                    "Job {} completed - {} words, {} chars",
                    ticket.job_id,
                    transcript.word_count,
                    transcript.text.len()
                );
                JobUpdate::completed(transcript)
            }
            Err(JobFailure::Registry(e)) => {
                // The record itself refused the update; writing a failure would
                // be refused the same way.
                error!("Job {} abandoned: {}", ticket.job_id, e);
                return;
            }
            Err(failure) => {
                error!("Job {} failed: {}", ticket.job_id, failure);
                JobUpdate::failed(failure.to_string())
            }
        };

        if let Err(e) = self.registry.update(&ticket.job_id, update).await {
            error!("Failed to record outcome of job {}: {}", ticket.job_id, e);
        }
    }

    async fn transcribe(&self, ticket: &JobTicket) -> Result<Transcript, JobFailure> {
        self.checkpoint(ticket, 10, "Starting...").await?;

        // The program writes fixed file names into its current directory, so
        // each job runs in a private directory removed when `work_dir` drops.
        fs::create_dir_all(&self.config.work_root)
            .await
            .map_err(JobFailure::Workspace)?;
        let work_dir = Builder::new()
            .prefix(&format!("{}-", ticket.job_id))
            .tempdir_in(&self.config.work_root)
            .map_err(JobFailure::Workspace)?;
        let invocation = Invocation {
            job_id: ticket.job_id.clone(),
            source_url: ticket.source_url.clone(),
            language: ticket.language.clone(),
            compress: ticket.compress,
            work_dir: work_dir.path().to_path_buf(),
        };
        self.checkpoint(ticket, 30, "Preparing transcription...")
            .await?;

        let mut running = self.program.launch(&invocation).await?;
        self.checkpoint(ticket, 60, "Transcribing audio...").await?;

        let output = match timeout(self.config.timeout, running.wait()).await {
            Ok(output) => output?,
            Err(_) => return Err(JobFailure::Timeout(self.config.timeout)),
        };
        debug!("Program output for job {}: {}", ticket.job_id, output.stdout);

        if !output.success() {
            return Err(JobFailure::ProgramFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        self.checkpoint(ticket, 90, "Collecting transcript...")
            .await?;
        self.harvest(ticket, work_dir.path(), &output).await
    }

    // Copies the program's transcript into the results area and reads it back.
    async fn harvest(
        &self,
        ticket: &JobTicket,
        work_dir: &Path,
        output: &ProgramOutput,
    ) -> Result<Transcript, JobFailure> {
        let produced = work_dir.join(&self.config.transcript_file_name);
        if !fs::try_exists(&produced).await.unwrap_or(false) {
            return Err(JobFailure::MissingArtifact(produced));
        }

        fs::create_dir_all(&self.config.results_dir).await?;
        let result_path = self
            .config
            .results_dir
            .join(format!("{}.txt", ticket.job_id));
        fs::copy(&produced, &result_path).await?;

        let bytes = fs::read(&result_path).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let confidence = average_confidence(&text);

        Ok(Transcript::new(text, result_path.display().to_string())
            .with_duration(parse_duration(&output.stdout))
            .with_confidence(confidence))
    }

    async fn checkpoint(
        &self,
        ticket: &JobTicket,
        progress: u8,
        message: &str,
    ) -> Result<(), JobFailure> {
        self.registry
            .update(&ticket.job_id, JobUpdate::processing(progress, message))
            .await?;
        debug!("Job {} at {}%: {}", ticket.job_id, progress, message);
        Ok(())
    }
}
