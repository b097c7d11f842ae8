//! Defines the app level error type and its conversion to JSON responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::validation::FieldError;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more fields in the request failed type coercion.
    ///
    /// Each entry describes where the offending value was found (e.g.,
    /// `["body", "amount"]`) and why it was rejected.
    #[error("request validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// The requested resource was not found.
    ///
    /// The message is sent to the client as-is in the `detail` field.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("{0}")]
    NotFound(&'static str),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// A database connection could not be taken from the pool.
    #[error("could not acquire a database connection: {0}")]
    PoolError(String),
}

impl Error {
    /// The message used when a query for a resource returned no rows.
    pub const NOT_FOUND_MESSAGE: &'static str = "Not Found";
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound(Error::NOT_FOUND_MESSAGE),
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<r2d2::Error> for Error {
    fn from(value: r2d2::Error) -> Self {
        tracing::error!("could not get a connection from the pool: {}", value);
        Error::PoolError(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": errors })),
            )
                .into_response(),
            Error::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": message }))).into_response()
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                internal_server_error()
            }
        }
    }
}

/// The generic response for failures the client cannot fix.
pub(crate) fn internal_server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal Server Error" })),
    )
        .into_response()
}
