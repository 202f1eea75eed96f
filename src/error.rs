use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use thiserror::Error;

/// Failures surfaced by request handlers and the services they call.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or range.
    #[error("{0}")]
    Validation(String),
    /// A referenced record does not exist. Carries a human label.
    #[error("{0} not found.")]
    NotFound(&'static str),
    /// The client may not mutate this record.
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("You must be logged in to do that.")]
    Unauthorized,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", e))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::Database(_) | Self::Internal(_) => {
                log::error!("{}", self);
                "Something went wrong.".to_owned()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "message": message }))
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
