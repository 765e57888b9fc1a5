use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub const AUTH_REALM: &str = "Basic realm=\"immersion-tracker\"";

/// Errors surfaced to API callers
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("show {0} not found")]
    ShowNotFound(i64),

    #[error("invalid sync event: {0}")]
    InvalidEvent(String),

    #[error("metadata service: {0}")]
    Upstream(String),

    #[error("authentication required")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    pub fn status(&self) -> StatusCode {
        match self {
            TrackerError::ShowNotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            TrackerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            TrackerError::Unauthorized => StatusCode::UNAUTHORIZED,
            TrackerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response for API errors
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {:#}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        let mut response = (status, body).into_response();
        if matches!(self, TrackerError::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTH_REALM),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TrackerError::ShowNotFound(3).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            TrackerError::InvalidEvent("year 10000".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TrackerError::Upstream("login failed".to_string()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(TrackerError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            TrackerError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = TrackerError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            AUTH_REALM
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(TrackerError::ShowNotFound(7).to_string(), "show 7 not found");
        assert_eq!(
            TrackerError::Upstream("series lookup failed".to_string()).to_string(),
            "metadata service: series lookup failed"
        );
    }
}
