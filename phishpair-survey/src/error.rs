//! HTTP error type for the survey server

use crate::content::ContentError;
use crate::recorder::RecordError;
use crate::sampler::SamplerError;
use crate::session::SessionError;
use crate::survey::SurveyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Participant has answered every pair (409)
    #[error("Survey complete: {0}")]
    Complete(String),

    /// Corpus cannot support the survey (503)
    #[error("Survey unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SurveyError> for ApiError {
    fn from(err: SurveyError) -> Self {
        let message = err.to_string();
        match err {
            SurveyError::UnknownParticipant(_) => ApiError::NotFound(message),
            SurveyError::Sampler(
                SamplerError::InsufficientCorpus { .. } | SamplerError::ExhaustedCorpus { .. },
            ) => ApiError::Unavailable(message),
            SurveyError::Session(SessionError::OutOfSequence { .. })
            | SurveyError::Record(RecordError::Session(SessionError::OutOfSequence { .. })) => {
                ApiError::Complete(message)
            }
            SurveyError::Session(SessionError::SequenceNotStarted)
            | SurveyError::Record(
                RecordError::Session(SessionError::SequenceNotStarted)
                | RecordError::PairNumberMismatch { .. }
                | RecordError::InvalidSelection { .. }
                | RecordError::InvalidViewTime(_),
            ) => ApiError::BadRequest(message),
            SurveyError::Content(ContentError::UnsafeFilename(_)) => ApiError::BadRequest(message),
            SurveyError::Record(RecordError::PersistFailure(_))
            | SurveyError::Corpus(_)
            | SurveyError::Content(_)
            | SurveyError::Store(_) => ApiError::Internal(message),
        }
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::NotFound(format!("Malformed participant id: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Complete(msg) => (StatusCode::CONFLICT, "SURVEY_COMPLETE", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SURVEY_UNAVAILABLE", msg)
            }
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use uuid::Uuid;

    fn status_of(err: SurveyError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(SurveyError::UnknownParticipant(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SurveyError::Sampler(SamplerError::InsufficientCorpus {
                available: 0
            })),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(SurveyError::Record(RecordError::PairNumberMismatch {
                expected: 1,
                submitted: 3
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SurveyError::Record(RecordError::InvalidSelection {
                selected: "x".into(),
                left: "a".into(),
                right: "b".into(),
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SurveyError::Record(RecordError::PersistFailure(
                StoreError::Corrupt("bad".into())
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(SurveyError::Session(SessionError::OutOfSequence {
                position: 10,
                total_pairs: 10
            })),
            StatusCode::CONFLICT
        );
    }
}
