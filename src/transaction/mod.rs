//! Transaction management for the ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `NewTransaction` for creating transactions
//! - Database functions for storing and querying transactions
//! - Route handlers for the transaction JSON API

mod core;
mod create_endpoint;
mod list_endpoint;

pub use self::core::{
    NewTransaction, Transaction, TransactionId, create_transaction_table, get_transaction,
    insert_transaction, list_transactions,
};
pub use create_endpoint::create_transaction_endpoint;
pub use list_endpoint::{ListParams, list_transactions_endpoint};

#[cfg(test)]
pub use self::core::count_transactions;
#[cfg(test)]
pub use list_endpoint::NO_TRANSACTIONS_FOUND;
