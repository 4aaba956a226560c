use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Shared user-facing error messages, kept in one place so handlers and
/// queries agree on wording (the strings show up in API responses).
pub mod msg {
    pub const ORG_NOT_FOUND: &str = "Organization not found";
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const PROJECT_NOT_FOUND: &str = "Project not found";
    pub const MODULE_NOT_FOUND: &str = "Module not found";
    pub const SUBMODULE_NOT_FOUND: &str = "Submodule not found";
    pub const TEST_CASE_NOT_FOUND: &str = "Test case not found";
    pub const EXECUTION_NOT_FOUND: &str = "Execution not found";
    pub const STEP_RESULT_NOT_FOUND: &str = "Step result not found";

    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const ROLES_EMPTY: &str = "User must hold at least one role";
    pub const STEPS_NOT_INCREASING: &str = "Step numbers must be strictly increasing";

    pub const DUPLICATE_PROJECT_NAME: &str = "A project with this name already exists";
    pub const DUPLICATE_EMAIL: &str = "A user with this email already exists";

    pub const INSUFFICIENT_ROLE: &str = "Insufficient role for this operation";
    pub const NOT_ASSIGNED: &str = "Not assigned to this module or project";
    pub const NOT_EXECUTION_ACTOR: &str =
        "Only the assigned user, a module assignee, or an admin may act on this execution";
    pub const ASSIGNEE_ROLE_REQUIRED: &str = "Assignee must hold the QA, BA, or TESTER role";

    pub const EXECUTION_COMPLETED: &str = "Execution is already completed";
    pub const RESULT_REQUIRED: &str = "Completing an execution requires an overall result";
    pub const ANALYTICS_USER_FILTER_ADMIN_ONLY: &str =
        "Filtering analytics by user requires the ADMIN role";
}

/// Extension trait for turning `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated", None),
            AppError::AccessDenied(msg) => {
                (StatusCode::FORBIDDEN, "Access denied", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::InvalidState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid state",
                Some(msg.clone()),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
