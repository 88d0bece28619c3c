use async_trait::async_trait;
use job_registry::JobRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use transcription_runner::{
    Invocation, ProgramError, ProgramOutput, RunnerConfig, RunningProgram, TranscriptionProgram,
};

use crate::config::DEFAULT_TRANSCRIPT_FILE_NAME;
use crate::routes::AppState;

// Mock program that either writes a transcript or exits with an error
pub enum MockProgram {
    Succeed(&'static str),
    Fail(&'static str),
}

struct MockRun {
    transcript: Option<&'static str>,
    stderr: &'static str,
    work_dir: PathBuf,
}

#[async_trait]
impl TranscriptionProgram for MockProgram {
    async fn launch(&self, invocation: &Invocation) -> Result<Box<dyn RunningProgram>, ProgramError> {
        let (transcript, stderr) = match self {
            Self::Succeed(text) => (Some(*text), ""),
            Self::Fail(stderr) => (None, *stderr),
        };
        Ok(Box::new(MockRun {
            transcript,
            stderr,
            work_dir: invocation.work_dir.clone(),
        }))
    }
}

#[async_trait]
impl RunningProgram for MockRun {
    async fn wait(&mut self) -> Result<ProgramOutput, ProgramError> {
        match self.transcript {
            Some(text) => {
                tokio::fs::write(self.work_dir.join(DEFAULT_TRANSCRIPT_FILE_NAME), text)
                    .await
                    .map_err(ProgramError::Wait)?;
                Ok(ProgramOutput {
                    exit_code: Some(0),
                    stdout: "Duration: 1:05\n".to_string(),
                    stderr: String::new(),
                })
            }
            None => Ok(ProgramOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: self.stderr.to_string(),
            }),
        }
    }
}

pub fn runner_config(dir: &TempDir) -> RunnerConfig {
    RunnerConfig {
        results_dir: dir.path().join("results"),
        work_root: dir.path().join("work"),
        transcript_file_name: DEFAULT_TRANSCRIPT_FILE_NAME.to_string(),
        timeout: Duration::from_secs(5),
    }
}

pub async fn test_state(dir: &TempDir, program: MockProgram) -> AppState {
    let registry = Arc::new(JobRegistry::open(dir.path().join("jobs.json")).await);
    AppState::new(registry, Arc::new(program), runner_config(dir))
}

/// Polls until the job leaves the queued/processing states.
pub async fn wait_for_terminal(state: &AppState, job_id: &str) -> job_registry::JobRecord {
    for _ in 0..200 {
        if let Some(job) = state.registry.get(job_id).await {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", job_id);
}
