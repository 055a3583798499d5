//! Response envelope and error mapping shared by the resource handlers.
//!
//! Every body is `{"error": bool, ...}` with either `data` or `message`.
//! Storage failures are logged here and surface as a generic `500`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

pub const CANNOT_PARSE_JSON: &str = "Cannot parse JSON";
pub const NOT_FOUND: &str = "Not found";

#[derive(Debug, Serialize, ToSchema)]
pub struct DataResponse<T> {
    pub error: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { error: false, data }
    }

    /// Serialize with the given status code.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub error: bool,
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn ok(message: &str) -> Self {
        Self {
            error: false,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            error: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{message}: {source}")]
    Database {
        message: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl ApiError {
    /// Wraps a storage failure with the message returned to the client.
    pub fn database(message: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { message, source }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Conflict(message) => {
                message
            }
            Self::Database { message, .. } => message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Database { message, source } = &self {
            error!("{message}: {source}");
        }
        let status = self.status();
        (status, Json(MessageResponse::error(self.client_message()))).into_response()
    }
}

/// Router fallback so unmatched paths still answer with the JSON envelope.
pub async fn fallback() -> ApiError {
    ApiError::NotFound(NOT_FOUND)
}

/// Unwraps a JSON body, mapping any extractor rejection to `400 Cannot parse JSON`.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!("rejected request body: {}", rejection.body_text());
            Err(ApiError::BadRequest(CANNOT_PARSE_JSON))
        }
    }
}

/// SQLSTATE `23505`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// SQLSTATE `23505` raised by the named constraint or index.
pub fn is_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err.constraint().is_some_and(|c| c == constraint)
        }
        _ => false,
    }
}

/// SQLSTATE `23503`.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}
