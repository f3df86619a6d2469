use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use utoipa::ToSchema;

/// ApiError
///
/// The single error type surfaced by every handler. Each variant carries the
/// message that ends up in the JSON error body, and maps onto one of four
/// status classes: 400 (input), 401 (authorization), 404 (not found),
/// 500 (storage).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // --- Input errors (400) ---
    #[error("id in path has a wrong format")]
    IdInPathWrongFormat,
    #[error("{0}")]
    Validation(String),
    #[error("date does not match the expected format")]
    BadDateFormat,
    #[error("date is outside the allowed range")]
    DateOutOfRange,
    #[error("start date must precede end date")]
    StartDateAfterEnd,
    #[error("cannot delete the only remaining admin")]
    CannotDeleteOnlyAdmin,
    #[error("user still leads projects as a manager")]
    ManagerStillLeadsProjects,

    // --- Authorization errors (401) ---
    #[error("wrong email and password combination")]
    WrongEmailOrPassword,
    #[error("wrong password")]
    WrongPassword,
    #[error("insufficient privileges")]
    InsufficientPrivileges,
    #[error("cannot create a project for another manager")]
    CannotCreateProjectForOthers,
    #[error("authorization token is missing or malformed")]
    MissingToken,
    #[error("token is missing required claims")]
    MissingTokenClaims,
    #[error("token is invalid or expired")]
    InvalidToken,

    // --- Not found (404) ---
    #[error("{0} not found")]
    NotFound(&'static str),

    // --- Storage errors (500, or 400 on uniqueness violations) ---
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

/// ErrorBody
///
/// JSON shape of every error response: `{"Error": "<message>"}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::IdInPathWrongFormat
            | ApiError::Validation(_)
            | ApiError::BadDateFormat
            | ApiError::DateOutOfRange
            | ApiError::StartDateAfterEnd
            | ApiError::CannotDeleteOnlyAdmin
            | ApiError::ManagerStillLeadsProjects => StatusCode::BAD_REQUEST,

            ApiError::WrongEmailOrPassword
            | ApiError::WrongPassword
            | ApiError::InsufficientPrivileges
            | ApiError::CannotCreateProjectForOthers
            | ApiError::MissingToken
            | ApiError::MissingTokenClaims
            | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,

            ApiError::NotFound(_) => StatusCode::NOT_FOUND,

            // Uniqueness violations (duplicate email/name) are client errors;
            // everything else from the pool is a server-side failure.
            ApiError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
