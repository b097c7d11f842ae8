//! The cross-origin policy for browser clients.

use axum::http::{HeaderValue, header::InvalidHeaderValue};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// The origin allowed when none is configured, the development web client.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Build a CORS layer that lets `allowed_origins` use any method and header
/// with credentials.
///
/// Wildcards cannot be combined with credentials, so the requested method
/// and headers are mirrored back instead.
///
/// # Errors
/// Returns an error if an origin is not a valid header value.
pub fn cors_layer<S: AsRef<str>>(allowed_origins: &[S]) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins = allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin.as_ref().trim()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}
