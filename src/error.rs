use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// AppError
///
/// Failure taxonomy of the gateway. Only configuration mistakes and explicit API calls
/// surface these to a client; dashboard navigation turns denials into redirects.
#[derive(Debug, Error, PartialEq)]
pub enum AppError {
    /// The identity provider could not produce a principal from the credential.
    #[error("identity unresolved: {0}")]
    IdentityUnresolved(String),

    /// The backend "synchronize user" call failed or returned an unusable payload.
    #[error("user sync failed: {0}")]
    SyncFailed(String),

    #[error("principal is not authorized for this section")]
    Unauthorized,

    /// A denial destination would itself be gated, which would redirect forever.
    #[error("redirect target `{0}` sits behind a gate")]
    RedirectLoopRisk(String),

    #[error("a role requirement must name at least one role")]
    EmptyRequirement,

    #[error("no session is attached to this request")]
    SessionMissing,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::IdentityUnresolved(_) => StatusCode::UNAUTHORIZED,
            AppError::SyncFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::RedirectLoopRisk(_)
            | AppError::EmptyRequirement
            | AppError::SessionMissing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
