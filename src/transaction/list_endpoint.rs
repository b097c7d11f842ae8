//! Defines the endpoint for listing stored transactions.
use axum::{
    Json,
    extract::{FromRequestParts, Query, rejection::QueryRejection},
    http::request::Parts,
};
use serde::Deserialize;

use crate::{
    Error,
    session::Session,
    transaction::{Transaction, core::list_transactions},
    validation::{FieldError, QUERY},
};

/// The message sent when a listing finds no transactions.
pub const NO_TRANSACTIONS_FOUND: &str = "No transactions found";

/// The number of transactions returned when the client does not set `limit`.
pub const DEFAULT_LIMIT: u32 = 100;

/// The offset/limit window requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// How many transactions to skip from the start.
    pub skip: u32,
    /// The maximum number of transactions to return.
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<Self>::try_from_uri(&parts.uri).map_err(query_error)?;

        Ok(params)
    }
}

/// Convert a query string rejection into a validation error located at the
/// parameter named in the rejection, e.g. `["query", "limit"]`.
fn query_error(rejection: QueryRejection) -> Error {
    let detail = rejection.body_text();
    let reason = detail
        .strip_prefix("Failed to deserialize query string: ")
        .unwrap_or(&detail);

    let error = match reason.split_once(": ") {
        Some((param, msg)) if param == "skip" || param == "limit" => FieldError::new(
            &[QUERY, param],
            format!("Input should be a non-negative integer, {msg}"),
            "int_parsing",
        ),
        _ => FieldError::new(&[QUERY], reason, "query_invalid"),
    };

    Error::Validation(vec![error])
}

/// A route handler for listing transactions a page at a time.
///
/// An empty page is reported as [Error::NotFound] rather than an empty list.
pub async fn list_transactions_endpoint(
    session: Session,
    params: ListParams,
) -> Result<Json<Vec<Transaction>>, Error> {
    let transactions = list_transactions(params.skip, params.limit, session.connection()?)?;

    if transactions.is_empty() {
        return Err(Error::NotFound(NO_TRANSACTIONS_FOUND));
    }

    Ok(Json(transactions))
}
