use thiserror::Error;

use crate::domain::{CustomerId, LedgerError, TransactionId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Customer name must not be empty")]
    EmptyName,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Customer name '{name}' matches {count} customers; use the customer id instead")]
    AmbiguousCustomer { name: String, count: usize },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn customer_not_found(id: CustomerId) -> Self {
        AppError::CustomerNotFound(id.to_string())
    }
}
