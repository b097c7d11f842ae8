//! A small ledger service for recording income and expenses.
//!
//! This library provides a JSON REST API for creating and listing
//! transactions stored in a SQLite database.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod cors;
mod db;
mod endpoints;
mod error;
mod logging;
mod not_found;
mod routing;
mod session;
mod transaction;
mod validation;

pub use app_state::AppState;
pub use cors::{DEFAULT_ALLOWED_ORIGIN, cors_layer};
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use session::{DbSettings, Session, SessionFactory};
pub use transaction::{
    ListParams, NewTransaction, Transaction, TransactionId, create_transaction_endpoint,
    get_transaction, insert_transaction, list_transactions, list_transactions_endpoint,
};
pub use validation::FieldError;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
