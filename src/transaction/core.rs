//! Defines the core data models and database queries for transactions.

use std::fmt;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Error,
    validation::{JsonFields, coerce_bool, coerce_float, coerce_string},
};

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = i64;

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction, assigned by the database.
    pub id: TransactionId,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// A free-form label for grouping transactions, e.g. "food".
    pub category: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// Whether money was earned rather than spent.
    pub is_income: bool,
    /// When the transaction happened, stored as the text the client sent.
    pub date: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [NewTransaction] for discoverability.
    pub fn build(amount: f64) -> NewTransaction {
        NewTransaction {
            amount,
            category: None,
            description: None,
            is_income: false,
            date: None,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Transaction(id={}, amount={}, is_income={})>",
            self.id, self.amount, self.is_income
        )
    }
}

/// A transaction that has not been saved yet.
///
/// Only `amount` is required, the other fields default to `None` and
/// `is_income` defaults to `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    /// The amount of money spent or earned.
    pub amount: f64,
    /// A free-form label for grouping transactions.
    pub category: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// Whether money was earned rather than spent.
    pub is_income: bool,
    /// When the transaction happened.
    pub date: Option<String>,
}

impl NewTransaction {
    /// Set the category.
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Mark the transaction as income.
    pub fn is_income(mut self, is_income: bool) -> Self {
        self.is_income = is_income;
        self
    }

    /// Set the date.
    pub fn date(mut self, date: &str) -> Self {
        self.date = Some(date.to_owned());
        self
    }

    /// Read a new transaction from a JSON request body.
    ///
    /// Values are coerced where the intent is unambiguous, e.g. `"12.5"` is
    /// accepted as an amount. Fields not listed on [NewTransaction] are ignored.
    ///
    /// # Errors
    /// Returns [Error::Validation] listing every missing or invalid field.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let mut fields = JsonFields::new(value)?;

        let amount = fields.required("amount", coerce_float);
        let category = fields.nullable("category", coerce_string);
        let description = fields.nullable("description", coerce_string);
        let is_income = fields.with_default("is_income", false, coerce_bool);
        let date = fields.nullable("date", coerce_string);

        fields.finish()?;

        match (amount, category, description, is_income, date) {
            (Some(amount), Some(category), Some(description), Some(is_income), Some(date)) => {
                Ok(Self {
                    amount,
                    category,
                    description,
                    is_income,
                    date,
                })
            }
            // `finish` reports an error for every field that is `None` here.
            _ => Err(Error::Validation(Vec::new())),
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Insert a new transaction and return the ID the database assigned to it.
///
/// The row is not visible to other connections until the surrounding SQL
/// transaction is committed.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn insert_transaction(
    transaction: NewTransaction,
    connection: &Connection,
) -> Result<TransactionId, Error> {
    connection.execute(
        "INSERT INTO transactions (amount, category, description, is_income, date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            transaction.amount,
            transaction.category,
            transaction.description,
            transaction.is_income,
            transaction.date,
        ),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, amount, category, description, is_income, date FROM transactions WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get up to `limit` transactions, skipping the first `skip`.
///
/// Transactions are returned in the order they were created.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn list_transactions(
    skip: u32,
    limit: u32,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, amount, category, description, is_income, date FROM transactions
             ORDER BY id ASC LIMIT ?1 OFFSET ?2",
        )?
        .query_map((limit, skip), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM transactions;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL,
                category TEXT,
                description TEXT,
                is_income INTEGER NOT NULL DEFAULT 0,
                date TEXT
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS ix_transactions_id ON transactions(id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let category = row.get(2)?;
    let description = row.get(3)?;
    let is_income = row.get(4)?;
    let date = row.get(5)?;

    Ok(Transaction {
        id,
        amount,
        category,
        description,
        is_income,
        date,
    })
}

// ============================================================================
// TESTS
// ============================================================================
