//! Request-level errors and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing bearer credential in Authorization header")]
    MissingCredential,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Continuation limit exceeded after {0} tool rounds")]
    ContinuationLimitExceeded(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::MissingCredential => StatusCode::UNAUTHORIZED,
            ProxyError::Upstream(_) | ProxyError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::ContinuationLimitExceeded(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Value of `error.type` in the response body
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::BadRequest(_) => "invalid_request_error",
            ProxyError::MissingCredential => "authentication_error",
            ProxyError::Upstream(_) => "upstream_error",
            ProxyError::UpstreamStatus { .. } => "upstream_status_error",
            ProxyError::ContinuationLimitExceeded(_) => "continuation_limit_exceeded",
            ProxyError::Internal(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.error_type(), self.to_string())
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Upstream(err.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}
