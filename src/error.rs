use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cart already paid: {0}")]
    AlreadyPaid(String),

    #[error("Payment gateway unreachable: {0}")]
    GatewayUnreachable(String),

    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyPaid(_) => StatusCode::CONFLICT,
            AppError::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::ports::RepositoryError> for AppError {
    fn from(err: crate::ports::RepositoryError) -> Self {
        use crate::ports::RepositoryError;

        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::DuplicateReference(reference) => {
                AppError::Internal(format!("duplicate transaction reference {}", reference))
            }
            RepositoryError::InvalidTransition(reference) => {
                AppError::Internal(format!("conflicting status transition for {}", reference))
            }
            RepositoryError::Storage(details) => AppError::DatabaseError(details),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
