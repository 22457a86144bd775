use std::collections::HashMap;

use thiserror::Error;

use super::{AppState, Cents, Customer, CustomerId, Transaction, TransactionId, cents_in_range};

/// What to do with a transaction whose customer does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Refuse the transaction; the ledger is left untouched.
    #[default]
    Reject,
    /// Record the transaction without adjusting any balance.
    Record,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No customer with id {0}; transaction not recorded")]
    UnknownCustomer(CustomerId),

    #[error("Amount of {0} cents is outside the supported range")]
    AmountOutOfRange(Cents),

    #[error("Balance of customer {0} would leave the supported range")]
    BalanceOutOfRange(CustomerId),

    #[error("Ledger totals are too large to compute")]
    TotalOutOfRange,
}

/// Move `balance` by `delta`, keeping the result within the supported range.
fn adjust(balance: Cents, delta: Option<Cents>, owner: CustomerId) -> Result<Cents, LedgerError> {
    delta
        .and_then(|d| balance.checked_add(d))
        .filter(|b| cents_in_range(*b))
        .ok_or(LedgerError::BalanceOutOfRange(owner))
}

/// Sum amounts without wrapping.
pub fn total_cents(values: impl IntoIterator<Item = Cents>) -> Result<Cents, LedgerError> {
    values
        .into_iter()
        .try_fold(0 as Cents, |total, value| total.checked_add(value))
        .ok_or(LedgerError::TotalOutOfRange)
}

/// Compute the balance for a single customer from a list of transactions.
/// Balance = sum of TAKEN amounts - sum of PAID amounts
pub fn compute_balance(
    customer_id: CustomerId,
    transactions: &[Transaction],
) -> Result<Cents, LedgerError> {
    transactions
        .iter()
        .filter(|t| t.customer_id == customer_id)
        .try_fold(0, |balance, t| adjust(balance, t.delta(), customer_id))
}

/// Compute balances for every customer referenced by a transaction.
pub fn compute_all_balances(
    transactions: &[Transaction],
) -> Result<HashMap<CustomerId, Cents>, LedgerError> {
    let mut balances: HashMap<CustomerId, Cents> = HashMap::new();
    for transaction in transactions {
        let balance = balances.entry(transaction.customer_id).or_insert(0);
        *balance = adjust(*balance, transaction.delta(), transaction.customer_id)?;
    }
    Ok(balances)
}

/// Insert a transaction at the front of the sequence and move its owner's
/// balance in the same step. On error the state is left untouched.
pub fn record_transaction(
    state: &mut AppState,
    transaction: Transaction,
    policy: OrphanPolicy,
) -> Result<(), LedgerError> {
    if !cents_in_range(transaction.amount) {
        return Err(LedgerError::AmountOutOfRange(transaction.amount));
    }
    match state.customer_mut(transaction.customer_id) {
        Some(customer) => {
            customer.balance = adjust(customer.balance, transaction.delta(), customer.id)?
        }
        None if policy == OrphanPolicy::Record => {}
        None => return Err(LedgerError::UnknownCustomer(transaction.customer_id)),
    }
    state.transactions.insert(0, transaction);
    Ok(())
}

/// Remove a transaction and undo its effect on the owner's balance.
/// Returns `Ok(None)`, leaving the state untouched, if the id is unknown.
pub fn remove_transaction(
    state: &mut AppState,
    id: TransactionId,
) -> Result<Option<Transaction>, LedgerError> {
    let Some(position) = state.transactions.iter().position(|t| t.id == id) else {
        return Ok(None);
    };
    let owner = state.transactions[position].customer_id;
    let inverse = state.transactions[position].inverse_delta();
    if let Some(customer) = state.customer_mut(owner) {
        customer.balance = adjust(customer.balance, inverse, owner)?;
    }
    Ok(Some(state.transactions.remove(position)))
}

/// Remove a customer together with every transaction it owns.
pub fn remove_customer(state: &mut AppState, id: CustomerId) -> Option<Customer> {
    let position = state.customers.iter().position(|c| c.id == id)?;
    let customer = state.customers.remove(position);
    state.transactions.retain(|t| t.customer_id != id);
    Some(customer)
}

/// Overwrite every stored balance with the value derived from the transactions.
/// Returns the number of customers whose balance changed.
pub fn rebuild_balances(state: &mut AppState) -> Result<usize, LedgerError> {
    let balances = compute_all_balances(&state.transactions)?;
    let mut changed = 0;
    for customer in &mut state.customers {
        let expected = balances.get(&customer.id).copied().unwrap_or(0);
        if customer.balance != expected {
            customer.balance = expected;
            changed += 1;
        }
    }
    Ok(changed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub stored: Cents,
    pub expected: Cents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub customer_count: usize,
    pub transaction_count: usize,
    pub total_outstanding: Cents,
    pub mismatches: Vec<BalanceMismatch>,
    pub orphaned_transactions: Vec<TransactionId>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.mismatches.is_empty() && self.orphaned_transactions.is_empty()
    }

    pub fn issues(&self) -> Vec<String> {
        let mut issues: Vec<String> = self
            .mismatches
            .iter()
            .map(|m| {
                format!(
                    "Customer '{}' has stored balance {} cents but transactions sum to {} cents",
                    m.customer_name, m.stored, m.expected
                )
            })
            .collect();
        issues.extend(
            self.orphaned_transactions
                .iter()
                .map(|id| format!("Transaction {} references a missing customer", id)),
        );
        issues
    }
}

/// Check that every stored balance matches its transaction history.
///
/// Fails when the history itself cannot be summed within the supported range.
pub fn check_integrity(state: &AppState) -> Result<IntegrityReport, LedgerError> {
    let balances = compute_all_balances(&state.transactions)?;

    let mismatches = state
        .customers
        .iter()
        .filter_map(|c| {
            let expected = balances.get(&c.id).copied().unwrap_or(0);
            (c.balance != expected).then(|| BalanceMismatch {
                customer_id: c.id,
                customer_name: c.name.clone(),
                stored: c.balance,
                expected,
            })
        })
        .collect();

    let orphaned_transactions = state
        .transactions
        .iter()
        .filter(|t| state.customer(t.customer_id).is_none())
        .map(|t| t.id)
        .collect();

    Ok(IntegrityReport {
        customer_count: state.customers.len(),
        transaction_count: state.transactions.len(),
        total_outstanding: total_cents(state.customers.iter().map(|c| c.balance.max(0)))?,
        mismatches,
        orphaned_transactions,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{CustomerProfile, MAX_CENTS, TransactionDraft};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn state_with_customer(name: &str) -> (AppState, CustomerId) {
        let customer = Customer::new(CustomerProfile::new(name));
        let id = customer.id;
        let state = AppState {
            customers: vec![customer],
            ..AppState::default()
        };
        (state, id)
    }

    #[test]
    fn test_compute_balance_empty() {
        assert_eq!(compute_balance(Uuid::new_v4(), &[]), Ok(0));
    }

    #[test]
    fn test_compute_balance_mixed() {
        let amina = Uuid::new_v4();
        let other = Uuid::new_v4();
        let transactions = vec![
            Transaction::new(TransactionDraft::taken(amina, 5000, date())),
            Transaction::new(TransactionDraft::paid(amina, 2000, date())),
            Transaction::new(TransactionDraft::taken(other, 999, date())),
        ];

        assert_eq!(compute_balance(amina, &transactions), Ok(3000));
        assert_eq!(compute_balance(other, &transactions), Ok(999));

        let all = compute_all_balances(&transactions).unwrap();
        assert_eq!(all.get(&amina), Some(&3000));
        assert_eq!(all.get(&other), Some(&999));
    }

    #[test]
    fn test_record_transaction_adjusts_owner_and_prepends() {
        let (mut state, id) = state_with_customer("Amina");
        let first = Transaction::new(TransactionDraft::taken(id, 5000, date()));
        let second = Transaction::new(TransactionDraft::paid(id, 2000, date()));
        let second_id = second.id;

        record_transaction(&mut state, first, OrphanPolicy::Reject).unwrap();
        record_transaction(&mut state, second, OrphanPolicy::Reject).unwrap();

        assert_eq!(state.customer(id).unwrap().balance, 3000);
        assert_eq!(state.transactions[0].id, second_id);
    }

    #[test]
    fn test_record_orphan_rejected_by_default() {
        let (mut state, _) = state_with_customer("Amina");
        let before = state.clone();
        let missing = Uuid::new_v4();
        let tx = Transaction::new(TransactionDraft::taken(missing, 100, date()));

        let result = record_transaction(&mut state, tx, OrphanPolicy::default());

        assert_eq!(result, Err(LedgerError::UnknownCustomer(missing)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_record_orphan_when_allowed() {
        let (mut state, id) = state_with_customer("Amina");
        let tx = Transaction::new(TransactionDraft::taken(Uuid::new_v4(), 100, date()));

        record_transaction(&mut state, tx, OrphanPolicy::Record).unwrap();

        assert_eq!(state.transactions.len(), 1);
        assert_eq!(state.customer(id).unwrap().balance, 0);
        assert_eq!(check_integrity(&state).unwrap().orphaned_transactions.len(), 1);
    }

    #[test]
    fn test_remove_transaction_undoes_delta() {
        let (mut state, id) = state_with_customer("Amina");
        let taken = Transaction::new(TransactionDraft::taken(id, 5000, date()));
        let taken_id = taken.id;
        record_transaction(&mut state, taken, OrphanPolicy::Reject).unwrap();
        record_transaction(
            &mut state,
            Transaction::new(TransactionDraft::paid(id, 2000, date())),
            OrphanPolicy::Reject,
        )
        .unwrap();

        let removed = remove_transaction(&mut state, taken_id).unwrap().unwrap();

        assert_eq!(removed.id, taken_id);
        assert_eq!(state.customer(id).unwrap().balance, -2000);
        assert_eq!(remove_transaction(&mut state, taken_id), Ok(None));
    }

    #[test]
    fn test_remove_customer_cascades() {
        let (mut state, id) = state_with_customer("Bashir");
        let (other_state, other_id) = state_with_customer("Amina");
        state.customers.extend(other_state.customers);
        for customer in [id, other_id] {
            record_transaction(
                &mut state,
                Transaction::new(TransactionDraft::taken(customer, 1000, date())),
                OrphanPolicy::Reject,
            )
            .unwrap();
        }

        remove_customer(&mut state, id).unwrap();

        assert!(state.customer(id).is_none());
        assert!(state.transactions.iter().all(|t| t.customer_id != id));
        assert_eq!(state.transactions.len(), 1);
    }

    #[test]
    fn test_check_integrity_flags_mismatch_and_rebuild_fixes_it() {
        let (mut state, id) = state_with_customer("Amina");
        record_transaction(
            &mut state,
            Transaction::new(TransactionDraft::taken(id, 5000, date())),
            OrphanPolicy::Reject,
        )
        .unwrap();
        state.customer_mut(id).unwrap().balance = 123;

        let report = check_integrity(&state).unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.mismatches[0].expected, 5000);
        assert_eq!(report.issues().len(), 1);

        assert_eq!(rebuild_balances(&mut state), Ok(1));
        assert!(check_integrity(&state).unwrap().is_healthy());
    }

    #[test]
    fn test_record_rejects_amount_beyond_limit() {
        let (mut state, id) = state_with_customer("Amina");
        let before = state.clone();

        for amount in [MAX_CENTS + 1, Cents::MIN] {
            let tx = Transaction::new(TransactionDraft::paid(id, amount, date()));
            assert_eq!(
                record_transaction(&mut state, tx, OrphanPolicy::Record),
                Err(LedgerError::AmountOutOfRange(amount))
            );
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_record_rejects_balance_beyond_limit() {
        let (mut state, id) = state_with_customer("Amina");
        record_transaction(
            &mut state,
            Transaction::new(TransactionDraft::taken(id, MAX_CENTS, date())),
            OrphanPolicy::Reject,
        )
        .unwrap();
        let before = state.clone();

        let result = record_transaction(
            &mut state,
            Transaction::new(TransactionDraft::taken(id, 1, date())),
            OrphanPolicy::Reject,
        );

        assert_eq!(result, Err(LedgerError::BalanceOutOfRange(id)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_remove_rejects_balance_beyond_limit_and_keeps_state() {
        let (mut state, id) = state_with_customer("Amina");
        let paid = Transaction::new(TransactionDraft::paid(id, 100, date()));
        let paid_id = paid.id;
        record_transaction(&mut state, paid, OrphanPolicy::Reject).unwrap();
        state.customer_mut(id).unwrap().balance = MAX_CENTS;
        let before = state.clone();

        assert_eq!(
            remove_transaction(&mut state, paid_id),
            Err(LedgerError::BalanceOutOfRange(id))
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_sums_beyond_limit_fail_instead_of_wrapping() {
        let (mut state, id) = state_with_customer("Amina");
        // Two large debts loaded from a document, bypassing record_transaction
        for _ in 0..2 {
            state.transactions.push(Transaction::new(TransactionDraft::taken(
                id,
                60_000_000_000_000_000,
                date(),
            )));
        }

        assert_eq!(
            compute_balance(id, &state.transactions),
            Err(LedgerError::BalanceOutOfRange(id))
        );
        assert_eq!(
            check_integrity(&state),
            Err(LedgerError::BalanceOutOfRange(id))
        );
        assert_eq!(
            rebuild_balances(&mut state),
            Err(LedgerError::BalanceOutOfRange(id))
        );
        assert_eq!(
            total_cents([Cents::MAX, 1]),
            Err(LedgerError::TotalOutOfRange)
        );
    }
}
