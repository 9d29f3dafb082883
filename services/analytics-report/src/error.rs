use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Failures of a single report request.
///
/// Every variant is scoped to the request that produced it and is surfaced to the
/// caller as `400 Bad Request`.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to obtain service account credentials: {0}")]
    Credential(String),
    #[error("Failed to reach analytics backend: {0}")]
    Connection(String),
    #[error("Analytics backend returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Malformed report response: {0}")]
    MalformedResponse(String),
    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReportError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Short machine-readable tag, used in logs and the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::Credential(_) => "credential",
            ReportError::Connection(_) => "connection",
            ReportError::Upstream { .. } => "upstream",
            ReportError::MalformedResponse(_) => "malformed_response",
            ReportError::Serialization(_) => "serialization",
        }
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ReportError::MalformedResponse(err.to_string())
        } else {
            ReportError::Connection(err.to_string())
        }
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (self.status_code(), body).into_response()
    }
}
