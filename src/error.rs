use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the whole API surface.
///
/// Every handler returns the first violated precondition as one of these;
/// `Internal` is the only variant a client may reasonably retry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("invalid credentials")]
    BadCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("refresh token is expired or has been rotated")]
    Expired,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_)
            | ApiError::BadCredentials
            | ApiError::InvalidToken(_)
            | ApiError::Expired => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upload(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 5xx details go to the log, not to the client.
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::BadCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::NotFound("user not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("taken").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn error_body_carries_status_code_and_message() {
        let resp = ApiError::Expired.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["statusCode"], 401);
        assert!(v["message"].as_str().unwrap().contains("rotated"));
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let resp = ApiError::Internal(anyhow::anyhow!("db password is hunter2")).into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["message"], "Internal server error");
    }
}
