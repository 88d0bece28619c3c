pub mod program;
pub mod services;

pub use program::external_program::ExternalProgram;
pub use program::transcription_program::{
    Invocation, ProgramError, ProgramOutput, RunningProgram, TranscriptionProgram,
};
pub use services::job_dispatcher::{DispatchedJob, JobDispatcher, JobRequest};
pub use services::transcription_runner::{
    DEFAULT_TIMEOUT, DEFAULT_TRANSCRIPT_FILE_NAME, JobFailure, JobTicket, RunnerConfig,
    TranscriptionRunner,
};
