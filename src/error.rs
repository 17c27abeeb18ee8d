use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::NotFound(_) => 404,
            AppError::InvalidState(_) | AppError::Conflict(_) => 409,
            AppError::Config(_) | AppError::StartServer(_) => 500,
        }
    }

    /// Stable machine-readable code for client-side routing
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::StartServer(_) => "START_FAILURE",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code(),
            code: self.error_code().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Unified API error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// User-facing explanation
    pub message: String,
    pub status: u16,
    /// Stable code, e.g. "INVALID_STATE"
    pub code: String,
    /// ISO 8601
    pub timestamp: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = self.to_response();
        HttpResponse::build(
            actix_web::http::StatusCode::from_u16(self.status_code())
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        )
        .json(body)
    }
}

// NOTE: No need to implement From<AppError> for actix_web::Error
// because actix-web provides a blanket impl for all ResponseError types.
