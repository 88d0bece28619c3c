use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

use super::transcription_program::{
    Invocation, ProgramError, ProgramOutput, RunningProgram, TranscriptionProgram,
};

/// Runs the delegated program as a child process.
///
/// The command line is `<program> <base_args...> <invocation args...>`, run
/// from the invocation's work directory.
#[derive(Debug, Clone)]
pub struct ExternalProgram {
    program: String,
    base_args: Vec<String>,
}

impl ExternalProgram {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(invocation.args())
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl TranscriptionProgram for ExternalProgram {
    async fn launch(&self, invocation: &Invocation) -> Result<Box<dyn RunningProgram>, ProgramError> {
        debug!(
            "Running: {} {} {}",
            self.program,
            self.base_args.join(" "),
            invocation.args().join(" ")
        );

        let child = self
            .command(invocation)
            .spawn()
            .map_err(ProgramError::Launch)?;

        Ok(Box::new(ChildProgram { child }))
    }
}

struct ChildProgram {
    child: Child,
}

#[async_trait]
impl RunningProgram for ChildProgram {
    async fn wait(&mut self) -> Result<ProgramOutput, ProgramError> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();

        // Pipes are drained while waiting so a chatty program cannot block on a
        // full pipe buffer.
        let (status, stdout, stderr) =
            tokio::try_join!(self.child.wait(), read_pipe(stdout), read_pipe(stderr))
                .map_err(ProgramError::Wait)?;

        Ok(ProgramOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
