use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use gijiroku_services::{IntakeError, StoreError};

use crate::response::{Envelope, ErrorBody};

/// Client-facing error: a stable code plus the fixed code-to-status
/// mapping. Internal errors never leak their details past the message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "JOB_NOT_FOUND",
            "指定されたジョブが見つかりません",
        )
    }

    pub fn not_completed() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "JOB_NOT_COMPLETED",
            "ジョブはまだ完了していません",
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let status = match err.code() {
            "FILE_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "INVALID_FORMAT" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "CORRUPT_FILE" | "EMPTY_FILE" | "INVALID_REQUEST" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::not_found(),
            other => {
                tracing::error!(error = %other, "Store error in request handler");
                Self::internal("内部エラーが発生しました")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code,
                message: self.message,
            }),
            timestamp: Utc::now(),
        };
        (self.status, Json(body)).into_response()
    }
}
