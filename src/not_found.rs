use axum::response::{IntoResponse, Response};

use crate::Error;

/// The fallback handler for routes that do not exist.
pub async fn get_404_not_found() -> Response {
    Error::NotFound(Error::NOT_FOUND_MESSAGE).into_response()
}
