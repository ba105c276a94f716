use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures raised by a [`UserStore`](crate::store::UserStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique field (username or token) is already taken.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored element could not be converted to or from its document form.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored value does not have the shape the service writes.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Request-level error returned by every handler.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed required field.
    #[error("{0}")]
    Validation(String),

    /// Bad username/password pair.
    #[error("Invalid username or password")]
    Authentication,

    #[error("Access Token is required")]
    MissingToken,

    #[error("Invalid token or user not found")]
    UnknownToken,

    /// Username already present.
    #[error("{0}")]
    Conflict(String),

    /// No element matched the requested id.
    #[error("{0}")]
    NotFound(String),

    /// Store or unexpected failure; the message is shown, the cause only logged.
    #[error("{message}")]
    Server {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn server(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        AppError::Server {
            message,
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication | AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::UnknownToken | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Server { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Server { message, source } = &self {
            error!(error = %source, "{}", message);
        }
        let status = self.status();
        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}
