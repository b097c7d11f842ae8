//! Implements a struct that holds the state of the REST server.

use axum::extract::FromRef;

use crate::session::SessionFactory;

/// The state of the REST server.
#[derive(Debug, Clone, FromRef)]
pub struct AppState {
    /// Creates a database session for each request.
    pub session_factory: SessionFactory,
}

impl AppState {
    /// Create a new [AppState] that opens database sessions with `session_factory`.
    pub fn new(session_factory: SessionFactory) -> Self {
        Self { session_factory }
    }
}
