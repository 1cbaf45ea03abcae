use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bb8_redis::redis::RedisError;
use serde::Serialize;

/// Errors raised by the activity tracking services.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("invalid activity configuration: {0}")]
    InvalidConfig(String),

    #[error("redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("redis pool error: {0}")]
    Pool(#[from] bb8::RunError<RedisError>),

    #[error("corrupt activity entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("rotation task for session type {session_type} failed: {message}")]
    RotationTask {
        session_type: String,
        message: String,
    },

    /// Every window is stopped even when some fail; all failures are kept.
    #[error("failed to stop {} activity window(s): {}", .0.len(), join_errors(.0))]
    Stop(Vec<ActivityError>),
}

impl ActivityError {
    /// True when the failure comes from the remote store rather than from bad data or config.
    pub fn is_remote(&self) -> bool {
        matches!(self, ActivityError::Redis(_) | ActivityError::Pool(_))
    }
}

fn join_errors(errors: &[ActivityError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    BadRequest(String),
    ServiceUnavailable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg, "SERVICE_UNAVAILABLE")
            }
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<ActivityError> for AppError {
    fn from(err: ActivityError) -> Self {
        if err.is_remote() {
            tracing::warn!(error = %err, "Activity store unavailable");
            AppError::ServiceUnavailable("Activity tracking unavailable".to_string())
        } else {
            AppError::InternalServerError(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb8_redis::redis::ErrorKind;

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn app_error_into_response_maps_status_and_body() {
        let response = AppError::BadRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "bad");
        assert_eq!(json["code"], "BAD_REQUEST");

        let response = AppError::Unauthorized("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["code"], "UNAUTHORIZED");

        let response = AppError::NotFound("missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"], "missing");
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn app_error_internal_maps_to_generic_message() {
        let response = AppError::InternalServerError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["code"], "INTERNAL_SERVER_ERROR");
    }

    #[tokio::test]
    async fn redis_failures_map_to_service_unavailable() {
        let err = ActivityError::from(RedisError::from((ErrorKind::IoError, "connection refused")));
        assert!(err.is_remote());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = response_json(response).await;
        assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn corrupt_entries_map_to_internal_error() {
        let parse_err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = ActivityError::from(parse_err);
        assert!(!err.is_remote());
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn stop_error_lists_every_failure() {
        let err = ActivityError::Stop(vec![
            ActivityError::RotationTask {
                session_type: "web".to_string(),
                message: "panicked".to_string(),
            },
            ActivityError::RotationTask {
                session_type: "api".to_string(),
                message: "panicked".to_string(),
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("failed to stop 2 activity window(s)"));
        assert!(message.contains("web"));
        assert!(message.contains("api"));
    }
}
