use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metering_app::{ApiError, AppError};
use tokio::task::JoinError;

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ApiError,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>, code: Option<String>) -> Self {
        let body = ApiError {
            status: status.as_u16(),
            message: message.into(),
            code,
        };
        Self { status, body }
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        let api_error = ApiError::from(err);
        if api_error.status >= 500 {
            tracing::error!(status = api_error.status, message = %api_error.message, "request failed");
        }
        let status =
            StatusCode::from_u16(api_error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            body: api_error,
        }
    }
}

impl From<JoinError> for HttpError {
    fn from(err: JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "background task failed", None)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
