//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    validation::{BODY, FieldError},
};

/// Bodies longer than this many bytes are truncated in `info` level logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The largest request body the middleware will buffer, the same as axum's
/// default body limit.
pub const REQUEST_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
///
/// Bodies are passed on byte for byte, the lossy UTF-8 text is only used for
/// logging. A request body that cannot be read or is larger than
/// [REQUEST_BODY_LIMIT] is rejected as a validation error.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match to_bytes(body, REQUEST_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read request body: {error}");
            return Error::Validation(vec![FieldError::new(
                &[BODY],
                format!("Could not read request body: {error}"),
                "body_unreadable",
            )])
            .into_response();
        }
    };

    let body_text = lossy_text(&body_bytes);
    tracing::info!(
        method = %parts.method,
        uri = %parts.uri,
        "Received request, body: {}",
        truncate(&body_text)
    );
    log_full_body("request", &body_text);

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return crate::error::internal_server_error();
        }
    };

    let body_text = lossy_text(&body_bytes);
    tracing::info!(
        status = %parts.status,
        "Sending response, body: {}",
        truncate(&body_text)
    );
    log_full_body("response", &body_text);

    Response::from_parts(parts, Body::from(body_bytes))
}

fn lossy_text(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn log_full_body(kind: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::debug!("Full {kind} body: {body:?}");
    }
}

/// Shorten `body` to at most [LOG_BODY_LENGTH_LIMIT] bytes without splitting a character.
fn truncate(body: &str) -> String {
    if body.len() <= LOG_BODY_LENGTH_LIMIT {
        return format!("{body:?}");
    }

    let end = body
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|&index| index <= LOG_BODY_LENGTH_LIMIT)
        .last()
        .unwrap_or(0);

    format!("{:?}...", &body[..end])
}
