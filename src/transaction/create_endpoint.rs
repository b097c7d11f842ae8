//! Defines the endpoint for creating a new transaction.
use axum::{
    Json,
    extract::{FromRequest, Request, State},
};
use serde_json::Value;

use crate::{
    Error,
    session::SessionFactory,
    transaction::{
        NewTransaction, Transaction,
        core::{get_transaction, insert_transaction},
    },
    validation::{BODY, FieldError},
};

impl<S> FromRequest<S> for NewTransaction
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(request, state)
            .await
            .map_err(|rejection| {
                Error::Validation(vec![FieldError::new(
                    &[BODY],
                    rejection.body_text(),
                    "json_invalid",
                )])
            })?;

        NewTransaction::from_json(&value)
    }
}

/// A route handler for creating a new transaction.
///
/// Responds with the stored transaction, including the ID assigned by the database.
/// The session is only opened once the body has been read and validated.
pub async fn create_transaction_endpoint(
    State(session_factory): State<SessionFactory>,
    new_transaction: NewTransaction,
) -> Result<Json<Transaction>, Error> {
    let session = session_factory.acquire().await?;
    let id = insert_transaction(new_transaction, session.connection()?)?;
    session.commit()?;

    // Read the row back so the response reflects what was actually stored.
    let transaction = get_transaction(id, session.connection()?)?;
    tracing::info!("created transaction {transaction}");

    Ok(Json(transaction))
}
