pub mod job_dispatcher;
pub mod metrics;
pub mod transcription_runner;
