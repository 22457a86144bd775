use serde::{Deserialize, Serialize};

use super::{BusinessInfo, Customer, CustomerId, Transaction, TransactionId};

/// The whole ledger as one value: customers, transactions (newest first) and
/// business details. This is also the exact shape of the persisted and
/// exported JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub business_info: BusinessInfo,
}

impl AppState {
    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    pub fn customer_mut(&mut self, id: CustomerId) -> Option<&mut Customer> {
        self.customers.iter_mut().find(|c| c.id == id)
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Transactions owned by a customer, newest first.
    pub fn transactions_for(&self, id: CustomerId) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |t| t.customer_id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty() && self.transactions.is_empty()
    }
}
