use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, CustomerId, amount_serde};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Goods or services handed over on credit; the customer's debt grows
    Taken,
    /// A repayment; the customer's debt shrinks
    Paid,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Taken => "TAKEN",
            TransactionType::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Input for recording a new transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub customer_id: CustomerId,
    pub transaction_type: TransactionType,
    pub item: String,
    pub description: String,
    pub amount: Cents,
    pub date: NaiveDate,
}

impl TransactionDraft {
    pub fn new(
        customer_id: CustomerId,
        transaction_type: TransactionType,
        amount: Cents,
        date: NaiveDate,
    ) -> Self {
        Self {
            customer_id,
            transaction_type,
            item: String::new(),
            description: String::new(),
            amount,
            date,
        }
    }

    pub fn taken(customer_id: CustomerId, amount: Cents, date: NaiveDate) -> Self {
        Self::new(customer_id, TransactionType::Taken, amount, date)
    }

    pub fn paid(customer_id: CustomerId, amount: Cents, date: NaiveDate) -> Self {
        Self::new(customer_id, TransactionType::Paid, amount, date)
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = item.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A single debit or credit against a customer.
/// Transactions are never edited; corrections are a delete followed by a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "amount_serde")]
    pub amount: Cents,
    /// Business date of the event, chosen by the user
    pub date: NaiveDate,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(draft: TransactionDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: draft.customer_id,
            transaction_type: draft.transaction_type,
            item: draft.item,
            description: draft.description,
            amount: draft.amount,
            date: draft.date,
            created_at: Utc::now(),
        }
    }

    /// Effect of this transaction on its owner's balance.
    /// `None` when the amount has no negation (`Cents::MIN`).
    pub fn delta(&self) -> Option<Cents> {
        match self.transaction_type {
            TransactionType::Taken => Some(self.amount),
            TransactionType::Paid => self.amount.checked_neg(),
        }
    }

    /// Balance adjustment that undoes this transaction.
    pub fn inverse_delta(&self) -> Option<Cents> {
        self.delta()?.checked_neg()
    }
}
