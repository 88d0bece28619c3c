use axum::{
    extract::{Json, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use job_registry::{JobRecord, JobStatus};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tracing::{error, info, warn};
use transcription_runner::JobRequest;

use crate::error::ApiError;
use crate::routes::AppState;

pub const DEFAULT_LANGUAGE: &str = "ta-IN";
const DOWNLOAD_FILE_NAME: &str = "transcription.txt";

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    #[serde(default, alias = "youtube_url")]
    source_url: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default = "default_compress")]
    compress: bool,
    #[serde(default)]
    language: Option<String>,
}

const fn default_compress() -> bool {
    true
}

impl TranscribeRequest {
    fn into_job_request(self) -> Result<JobRequest, ApiError> {
        let source_url = non_blank(self.source_url).ok_or(ApiError::MissingSourceUrl)?;
        Ok(JobRequest {
            source_url,
            language: non_blank(self.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            email: non_blank(self.email),
            compress: self.compress,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    job_id: String,
}

pub async fn submit_transcription(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Result<(StatusCode, Json<TranscribeResponse>), ApiError> {
    let request = request.into_job_request()?;
    info!(
        "Received transcription request for {} ({})",
        request.source_url, request.language
    );

    let dispatched = state.dispatcher.dispatch_job(request).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(TranscribeResponse {
            job_id: dispatched.job_id,
        }),
    ))
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .registry
        .get(&job_id)
        .await
        .map(Json)
        .ok_or(ApiError::JobNotFound)
}

pub async fn download_transcript(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.registry.get(&job_id).await.ok_or(ApiError::JobNotFound)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::JobNotCompleted);
    }
    let file_path = job.file_path.ok_or(ApiError::FileNotFound)?;

    let body = match tokio::fs::read(&file_path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Result file {} for job {} is gone", file_path, job_id);
            return Err(ApiError::FileNotFound);
        }
        Err(e) => {
            error!("Failed to read result file {}: {}", file_path, e);
            return Err(ApiError::Internal(e.to_string()));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockProgram, test_state, wait_for_terminal};
    use tempfile::TempDir;

    fn request(json: serde_json::Value) -> TranscribeRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let job = request(serde_json::json!({ "source_url": " https://youtu.be/abc " }))
            .into_job_request()
            .unwrap();
        assert_eq!(job.source_url, "https://youtu.be/abc");
        assert_eq!(job.language, "ta-IN");
        assert_eq!(job.email, None);
        assert!(job.compress);
    }

    #[test]
    fn test_request_accepts_legacy_field_and_overrides() {
        let job = request(serde_json::json!({
            "youtube_url": "https://youtu.be/abc",
            "email": "",
            "compress": false,
            "language": "en-US"
        }))
        .into_job_request()
        .unwrap();
        assert_eq!(job.source_url, "https://youtu.be/abc");
        assert_eq!(job.language, "en-US");
        assert_eq!(job.email, None);
        assert!(!job.compress);
    }

    #[test]
    fn test_request_without_url_is_rejected() {
        let err = request(serde_json::json!({ "source_url": "   ", "language": "" }))
            .into_job_request()
            .unwrap_err();
        assert_eq!(err, ApiError::MissingSourceUrl);
    }

    #[tokio::test]
    async fn test_submit_returns_accepted_job() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, MockProgram::Succeed("one two three")).await;

        let (status, Json(body)) = submit_transcription(
            State(state.clone()),
            Json(request(serde_json::json!({
                "source_url": "https://youtu.be/abc",
                "email": "someone@example.com"
            }))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);

        let job = wait_for_terminal(&state, &body.job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.email.as_deref(), Some("someone@example.com"));
        assert_eq!(job.word_count, Some(3));
    }

    #[tokio::test]
    async fn test_status_of_unknown_job() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, MockProgram::Succeed("unused")).await;

        let err = get_job_status(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::JobNotFound);
    }

    #[tokio::test]
    async fn test_download_when_result_file_removed() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, MockProgram::Succeed("one two three")).await;
        let dispatched = state
            .dispatcher
            .dispatch_job(JobRequest {
                source_url: "https://youtu.be/abc".to_string(),
                language: DEFAULT_LANGUAGE.to_string(),
                email: None,
                compress: true,
            })
            .await;
        dispatched.task.await.unwrap();

        let job = state.registry.get(&dispatched.job_id).await.unwrap();
        std::fs::remove_file(job.file_path.unwrap()).unwrap();

        let err = download_transcript(State(state), Path(dispatched.job_id))
            .await
            .err()
            .unwrap();
        assert_eq!(err, ApiError::FileNotFound);
    }
}
