use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Everything the delegated program needs to transcribe one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub job_id: String,
    pub source_url: String,
    pub language: String,
    pub compress: bool,
    // The program writes its fixed-name transcript here.
    pub work_dir: PathBuf,
}

impl Invocation {
    /// Command-line arguments passed after the program's own base arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.source_url.clone(),
            "--language".to_string(),
            self.language.clone(),
        ];
        if self.compress {
            args.push("--compress".to_string());
        }
        args
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProgramOutput {
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Failed to launch transcription program: {0}")]
    Launch(std::io::Error),
    #[error("Failed to wait for transcription program: {0}")]
    Wait(std::io::Error),
}

#[async_trait]
pub trait TranscriptionProgram: Send + Sync {
    /// Starts the program. Resolves as soon as it is running.
    async fn launch(&self, invocation: &Invocation) -> Result<Box<dyn RunningProgram>, ProgramError>;
}

#[async_trait]
pub trait RunningProgram: Send {
    /// Waits for the program to exit and collects its output.
    ///
    /// Dropping the handle before this resolves must stop the program.
    async fn wait(&mut self) -> Result<ProgramOutput, ProgramError>;
}
