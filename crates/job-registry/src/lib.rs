use thiserror::Error;

pub mod models;
mod registry;

pub use models::{JobRecord, JobStatus, JobUpdate, NewJob, Transcript};
pub use registry::JobRegistry;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job {0} not found")]
    NotFound(String),
    #[error("job {id} is already {status}")]
    TerminalState { id: String, status: JobStatus },
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("job {id} progress cannot go back from {current} to {requested}")]
    ProgressRegression {
        id: String,
        current: u8,
        requested: u8,
    },
    #[error("job {id} progress {requested} is out of range")]
    ProgressOutOfRange { id: String, requested: u8 },
    #[error("invalid update for job {id}: {reason}")]
    InconsistentUpdate { id: String, reason: &'static str },
}
