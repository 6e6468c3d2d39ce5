use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Failures of room operations, shared by the HTTP and WebSocket entry points.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The store answered with an error.
    #[error("storage unavailable")]
    Unavailable(#[from] StorageError),
    /// No store is installed yet, or it was lost.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    #[error("not found: {0}")]
    NotFound(String),
    /// A precondition of a broadcasting action did not hold.
    ///
    /// Handlers settle this into [`ActionOutcome::Discarded`](crate::services::room_service::ActionOutcome).
    #[error("action rejected: {0}")]
    Rejected(#[from] ActionRejection),
    /// The room gate stayed busy past the configured timeout.
    #[error("room is busy; try again")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Why a broadcasting action was dropped without touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejection {
    #[error("room `{0}` does not exist")]
    RoomNotFound(String),
    #[error("user `{0}` does not exist")]
    UserNotFound(String),
    #[error("task `{0}` does not exist")]
    TaskNotFound(String),
    #[error("user `{user_id}` is not a member of room `{room_id}`")]
    NotInRoom { user_id: String, room_id: String },
    #[error("task `{task_id}` does not belong to room `{room_id}`")]
    TaskNotInRoom { task_id: String, room_id: String },
    #[error("user `{0}` is not the room admin")]
    NotAdmin(String),
    #[error("spectator `{0}` cannot vote")]
    Spectator(String),
    #[error("cards of room `{0}` are already revealed")]
    AlreadyRevealed(String),
    #[error("no session is registered for this connection")]
    NoSession,
}

/// HTTP face of [`ServiceError`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout => AppError::ServiceUnavailable("room is busy".into()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            // Only lookups that were never settled into an outcome end up here.
            ServiceError::Rejected(reason) => AppError::NotFound(reason.to_string()),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::Degraded, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::NotFound("room".into()), StatusCode::NOT_FOUND),
            (ServiceError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                ServiceError::Rejected(ActionRejection::RoomNotFound("ABCD1234".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
