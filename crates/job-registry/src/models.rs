use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::RegistryError;

/// Message every job starts with.
pub const INITIAL_MESSAGE: &str = "Starting...";
/// Message written once a transcript has been harvested.
pub const COMPLETE_MESSAGE: &str = "Complete!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a record in `self` may be moved to `next`.
    ///
    /// Staying in a non-terminal state is allowed so that progress and message
    /// updates can be applied without touching the status.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Queued | Self::Processing)
                | (Self::Processing, Self::Processing | Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Input for [`crate::JobRegistry::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub source_url: String,
    pub language: String,
    pub email: Option<String>,
}

/// A harvested transcript, attached to a job when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub word_count: usize,
    pub file_path: String,
    pub duration_secs: Option<u64>,
    pub confidence: Option<u8>,
}

impl Transcript {
    pub fn new(text: String, file_path: String) -> Self {
        let word_count = text.split_whitespace().count();
        Self {
            text,
            word_count,
            file_path,
            duration_secs: None,
            confidence: None,
        }
    }

    pub const fn with_duration(mut self, duration_secs: Option<u64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub const fn with_confidence(mut self, confidence: Option<u8>) -> Self {
        self.confidence = confidence;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub source_url: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    // Only set when the delegated program reports it; never a placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: String, job: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            message: INITIAL_MESSAGE.to_string(),
            source_url: job.source_url,
            language: job.language,
            email: job.email,
            transcript_text: None,
            word_count: None,
            duration_secs: None,
            confidence: None,
            error: None,
            file_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `update` into the record.
    ///
    /// The whole update is validated before anything is written, so a rejected
    /// update leaves the record exactly as it was.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>) -> Result<(), RegistryError> {
        if self.status.is_terminal() {
            return Err(RegistryError::TerminalState {
                id: self.id.clone(),
                status: self.status,
            });
        }

        let next = update.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next) {
            return Err(RegistryError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        if let Some(progress) = update.progress {
            if progress > 100 {
                return Err(RegistryError::ProgressOutOfRange {
                    id: self.id.clone(),
                    requested: progress,
                });
            }
            if progress < self.progress {
                return Err(RegistryError::ProgressRegression {
                    id: self.id.clone(),
                    current: self.progress,
                    requested: progress,
                });
            }
        }

        let reason = match next {
            JobStatus::Completed if update.transcript.is_none() => {
                Some("a completed job needs a transcript")
            }
            JobStatus::Failed if update.error.as_deref().is_none_or(str::is_empty) => {
                Some("a failed job needs a non-empty error")
            }
            JobStatus::Completed | JobStatus::Failed => None,
            JobStatus::Queued | JobStatus::Processing => None,
        }
        .or_else(|| {
            (update.transcript.is_some() && next != JobStatus::Completed)
                .then_some("a transcript can only be attached on completion")
        })
        .or_else(|| {
            (update.error.is_some() && next != JobStatus::Failed)
                .then_some("an error can only be attached on failure")
        });
        if let Some(reason) = reason {
            return Err(RegistryError::InconsistentUpdate {
                id: self.id.clone(),
                reason,
            });
        }

        self.status = next;
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(transcript) = update.transcript {
            self.word_count = Some(transcript.word_count);
            self.transcript_text = Some(transcript.text);
            self.file_path = Some(transcript.file_path);
            self.duration_secs = transcript.duration_secs;
            self.confidence = transcript.confidence;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.updated_at = now;

        Ok(())
    }
}

/// Partial fields merged into a record by [`crate::JobRegistry::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub transcript: Option<Transcript>,
    pub error: Option<String>,
}

impl JobUpdate {
    /// Progress checkpoint while the job is processing.
    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn completed(transcript: Transcript) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            message: Some(COMPLETE_MESSAGE.to_string()),
            transcript: Some(transcript),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(
            "job-1".to_string(),
            NewJob {
                source_url: "https://www.youtube.com/watch?v=abc".to_string(),
                language: "ta-IN".to_string(),
                email: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_new_record_is_queued() {
        let record = record();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.progress, 0);
        assert_eq!(record.message, INITIAL_MESSAGE);
        assert!(record.transcript_text.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_transcript_counts_whitespace_separated_words() {
        let transcript = Transcript::new("hello world".to_string(), "results/x.txt".to_string());
        assert_eq!(transcript.word_count, 2);

        let transcript = Transcript::new("  one\ttwo\n\nthree  ".to_string(), String::new());
        assert_eq!(transcript.word_count, 3);

        let transcript = Transcript::new(String::new(), String::new());
        assert_eq!(transcript.word_count, 0);
    }

    #[test]
    fn test_status_transitions() {
        use JobStatus::*;

        assert!(Queued.can_transition_to(Processing));
        assert!(!Queued.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Queued.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Queued));
        for terminal in [Completed, Failed] {
            for next in [Queued, Processing, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_apply_completion_sets_transcript_fields() {
        let mut record = record();
        record
            .apply(JobUpdate::processing(10, "Starting..."), Utc::now())
            .unwrap();
        let transcript = Transcript::new("hello world".to_string(), "results/job-1.txt".to_string())
            .with_duration(Some(75))
            .with_confidence(Some(92));
        record
            .apply(JobUpdate::completed(transcript), Utc::now())
            .unwrap();

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.message, COMPLETE_MESSAGE);
        assert_eq!(record.transcript_text.as_deref(), Some("hello world"));
        assert_eq!(record.word_count, Some(2));
        assert_eq!(record.file_path.as_deref(), Some("results/job-1.txt"));
        assert_eq!(record.duration_secs, Some(75));
        assert_eq!(record.confidence, Some(92));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_apply_rejects_completion_without_transcript() {
        let mut record = record();
        record
            .apply(JobUpdate::processing(60, "Transcribing audio..."), Utc::now())
            .unwrap();
        let before = record.clone();

        let update = JobUpdate {
            status: Some(JobStatus::Completed),
            ..JobUpdate::default()
        };
        let err = record.apply(update, Utc::now()).unwrap_err();

        assert!(matches!(err, RegistryError::InconsistentUpdate { .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn test_apply_rejects_empty_failure_message() {
        let mut record = record();
        record
            .apply(JobUpdate::processing(10, INITIAL_MESSAGE), Utc::now())
            .unwrap();
        let err = record.apply(JobUpdate::failed(""), Utc::now()).unwrap_err();
        assert!(matches!(err, RegistryError::InconsistentUpdate { .. }));
        assert_eq!(record.status, JobStatus::Processing);
    }

    #[test]
    fn test_apply_rejects_failing_a_queued_job() {
        let mut record = record();
        let before = record.clone();
        let err = record
            .apply(JobUpdate::failed("never started"), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidTransition {
                from: JobStatus::Queued,
                to: JobStatus::Failed,
                ..
            }
        ));
        assert_eq!(record, before);
    }

    #[test]
    fn test_apply_rejects_error_outside_failure() {
        let mut record = record();
        let update = JobUpdate {
            error: Some("boom".to_string()),
            ..JobUpdate::processing(10, "Starting...")
        };
        let err = record.apply(update, Utc::now()).unwrap_err();
        assert!(matches!(err, RegistryError::InconsistentUpdate { .. }));
    }

    #[test]
    fn test_serialized_status_is_lowercase() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["progress"], 0);
        assert!(json.get("transcript_text").is_none());
        assert!(json.get("error").is_none());
    }
}
