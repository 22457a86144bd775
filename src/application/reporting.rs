use serde::Serialize;

use crate::domain::{
    AppState, Cents, Customer, CustomerId, LedgerError, Transaction, TransactionType, total_cents,
};

/// How many transactions the dashboard shows.
pub const RECENT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// Sum of positive balances; credit held for customers is not netted off
    pub total_outstanding: Cents,
    pub total_paid: Cents,
    pub total_taken: Cents,
    pub customer_count: usize,
    pub customers_owing: usize,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerStatement {
    pub customer: Customer,
    pub total_taken: Cents,
    pub total_paid: Cents,
    /// Newest first
    pub transactions: Vec<Transaction>,
}

fn sum_of(transactions: &[&Transaction], kind: TransactionType) -> Result<Cents, LedgerError> {
    total_cents(
        transactions
            .iter()
            .filter(|t| t.transaction_type == kind)
            .map(|t| t.amount),
    )
}

pub fn dashboard(state: &AppState) -> Result<DashboardSummary, LedgerError> {
    let all: Vec<&Transaction> = state.transactions.iter().collect();

    Ok(DashboardSummary {
        total_outstanding: total_cents(state.customers.iter().map(|c| c.balance.max(0)))?,
        total_paid: sum_of(&all, TransactionType::Paid)?,
        total_taken: sum_of(&all, TransactionType::Taken)?,
        customer_count: state.customers.len(),
        customers_owing: state.customers.iter().filter(|c| c.owes_money()).count(),
        recent_transactions: state
            .transactions
            .iter()
            .take(RECENT_TRANSACTIONS)
            .cloned()
            .collect(),
    })
}

/// A customer's details and history. `Ok(None)` if the id is unknown.
pub fn customer_statement(
    state: &AppState,
    id: CustomerId,
) -> Result<Option<CustomerStatement>, LedgerError> {
    let Some(customer) = state.customer(id).cloned() else {
        return Ok(None);
    };
    let owned: Vec<&Transaction> = state.transactions_for(id).collect();

    Ok(Some(CustomerStatement {
        total_taken: sum_of(&owned, TransactionType::Taken)?,
        total_paid: sum_of(&owned, TransactionType::Paid)?,
        transactions: owned.into_iter().cloned().collect(),
        customer,
    }))
}

/// Customers whose name contains `term` (case-insensitive) or whose phone
/// contains `term` verbatim, largest balance first. An empty term matches
/// everyone.
pub fn search_customers(state: &AppState, term: &str) -> Vec<Customer> {
    let needle = term.to_lowercase();
    let mut matches: Vec<Customer> = state
        .customers
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&needle) || c.phone.contains(term))
        .cloned()
        .collect();
    matches.sort_by(|a, b| b.balance.cmp(&a.balance));
    matches
}

/// Transactions whose item, description or customer name contains `term`
/// (case-insensitive), optionally limited to one customer. Newest first.
pub fn search_transactions(
    state: &AppState,
    term: &str,
    customer: Option<CustomerId>,
) -> Vec<Transaction> {
    let needle = term.trim().to_lowercase();
    state
        .transactions
        .iter()
        .filter(|t| customer.is_none_or(|id| t.customer_id == id))
        .filter(|t| {
            needle.is_empty()
                || t.item.to_lowercase().contains(&needle)
                || t.description.to_lowercase().contains(&needle)
                || state
                    .customer(t.customer_id)
                    .is_some_and(|c| c.name.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}
