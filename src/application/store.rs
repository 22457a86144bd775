use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::domain::{
    self, AppState, BusinessInfo, Customer, CustomerId, CustomerProfile, CustomerUpdate,
    LedgerError, OrphanPolicy, Transaction, TransactionDraft, TransactionId,
};

/// Owner of the ledger aggregate.
///
/// The current state lives behind an `Arc` in a watch channel. Each mutation
/// clones the current value, applies its change and publishes the new `Arc`
/// in one step, so a reader only ever sees whole snapshots: never a
/// transaction without its balance effect, or the reverse. Mutations that
/// find nothing to change publish nothing.
///
/// The store records what it is given. Checks such as non-empty names or
/// positive amounts belong to the caller.
pub struct LedgerStore {
    sender: watch::Sender<Arc<AppState>>,
    orphan_policy: OrphanPolicy,
}

impl LedgerStore {
    pub fn new(initial: AppState) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self {
            sender,
            orphan_policy: OrphanPolicy::default(),
        }
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<AppState> {
        self.sender.borrow().clone()
    }

    /// Subscribe to snapshot changes. The receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.sender.subscribe()
    }

    /// Apply `change` to a copy of the current state and publish it if the
    /// closure reports a change. Runs under the channel's write lock.
    fn transition<T>(&self, change: impl FnOnce(&mut AppState) -> Option<T>) -> Option<T> {
        let mut outcome = None;
        self.sender.send_if_modified(|current| {
            let mut next = (**current).clone();
            outcome = change(&mut next);
            if outcome.is_some() {
                *current = Arc::new(next);
                true
            } else {
                false
            }
        });
        outcome
    }

    /// Like [`Self::transition`], for changes that can fail. A failed change
    /// publishes nothing.
    fn try_transition<T>(
        &self,
        change: impl FnOnce(&mut AppState) -> Result<Option<T>, LedgerError>,
    ) -> Result<Option<T>, LedgerError> {
        let mut failure = None;
        let outcome = self.transition(|state| match change(state) {
            Ok(outcome) => outcome,
            Err(err) => {
                failure = Some(err);
                None
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    // ========================
    // Customer operations
    // ========================

    /// Add a customer with a fresh id and a zero balance.
    pub fn add_customer(&self, profile: CustomerProfile) -> Customer {
        let customer = Customer::new(profile);
        let created = customer.clone();
        self.transition(move |state| {
            state.customers.push(customer);
            Some(())
        });
        debug!(customer_id = %created.id, name = %created.name, "customer added");
        created
    }

    /// Replace the provided profile fields. Unknown ids are ignored.
    pub fn update_customer(&self, id: CustomerId, update: CustomerUpdate) -> Option<Customer> {
        let updated = self.transition(|state| {
            let customer = state.customer_mut(id)?;
            customer.apply(update);
            Some(customer.clone())
        });
        if updated.is_some() {
            debug!(customer_id = %id, "customer updated");
        }
        updated
    }

    /// Remove a customer and all of its transactions. Unknown ids are ignored.
    pub fn delete_customer(&self, id: CustomerId) -> Option<Customer> {
        let removed = self.transition(|state| domain::remove_customer(state, id));
        if removed.is_some() {
            debug!(customer_id = %id, "customer deleted with its transactions");
        }
        removed
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a transaction and move the owner's balance by its delta.
    ///
    /// With [`OrphanPolicy::Reject`] an unknown customer id fails with
    /// [`LedgerError::UnknownCustomer`]. Amounts or balances outside the
    /// supported range fail as well. Nothing is published on failure.
    pub fn add_transaction(&self, draft: TransactionDraft) -> Result<Transaction, LedgerError> {
        let transaction = Transaction::new(draft);
        let policy = self.orphan_policy;
        let recorded = self.try_transition(|state| {
            domain::record_transaction(state, transaction.clone(), policy).map(Some)
        });

        if let Err(err) = recorded {
            debug!(customer_id = %transaction.customer_id, error = %err, "transaction rejected");
            return Err(err);
        }

        debug!(
            transaction_id = %transaction.id,
            customer_id = %transaction.customer_id,
            kind = %transaction.transaction_type,
            amount = transaction.amount,
            "transaction recorded"
        );
        Ok(transaction)
    }

    /// Remove a transaction and undo its balance effect. Unknown ids are
    /// ignored and give `Ok(None)`.
    pub fn delete_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        let removed = self.try_transition(|state| domain::remove_transaction(state, id))?;
        if removed.is_some() {
            debug!(transaction_id = %id, "transaction deleted");
        }
        Ok(removed)
    }

    // ========================
    // Whole-state operations
    // ========================

    pub fn update_business_info(&self, info: BusinessInfo) {
        self.transition(|state| {
            state.business_info = info;
            Some(())
        });
    }

    /// Replace everything with the empty default ledger.
    pub fn reset_data(&self) {
        self.restore(AppState::default());
        debug!("ledger reset to defaults");
    }

    /// Replace everything with the given state in one step.
    pub fn restore(&self, state: AppState) {
        self.sender.send_replace(Arc::new(state));
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::domain::MAX_CENTS;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_mutations_publish_new_snapshots() {
        let store = LedgerStore::default();
        let before = store.snapshot();

        let amina = store.add_customer(CustomerProfile::new("Amina"));

        let after = store.snapshot();
        assert!(before.customers.is_empty());
        assert_eq!(after.customers.len(), 1);
        assert_eq!(after.customer(amina.id).unwrap().balance, 0);
    }

    #[test]
    fn test_held_snapshot_is_not_affected_by_later_mutations() {
        let store = LedgerStore::default();
        let amina = store.add_customer(CustomerProfile::new("Amina"));
        let held = store.snapshot();

        store
            .add_transaction(TransactionDraft::taken(amina.id, 5000, date()))
            .unwrap();

        assert!(held.transactions.is_empty());
        assert_eq!(held.customer(amina.id).unwrap().balance, 0);
        assert_eq!(store.snapshot().customer(amina.id).unwrap().balance, 5000);
    }

    #[test]
    fn test_no_op_does_not_publish() {
        let store = LedgerStore::default();
        store.add_customer(CustomerProfile::new("Amina"));
        let receiver = store.subscribe();
        let before = store.snapshot();

        assert!(store.delete_customer(Uuid::new_v4()).is_none());
        assert_eq!(store.delete_transaction(Uuid::new_v4()), Ok(None));
        assert!(
            store
                .update_customer(Uuid::new_v4(), CustomerUpdate::default())
                .is_none()
        );

        assert!(!receiver.has_changed().unwrap());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_rejected_orphan_leaves_state_untouched() {
        let store = LedgerStore::default();
        let before = store.snapshot();
        let missing = Uuid::new_v4();

        let result = store.add_transaction(TransactionDraft::taken(missing, 100, date()));

        assert_eq!(result, Err(LedgerError::UnknownCustomer(missing)));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_out_of_range_amount_publishes_nothing() {
        let store = LedgerStore::default();
        let amina = store.add_customer(CustomerProfile::new("Amina"));
        let receiver = store.subscribe();
        let before = store.snapshot();

        let result =
            store.add_transaction(TransactionDraft::taken(amina.id, MAX_CENTS + 1, date()));

        assert_eq!(result, Err(LedgerError::AmountOutOfRange(MAX_CENTS + 1)));
        assert!(!receiver.has_changed().unwrap());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_orphan_recorded_when_policy_allows() {
        let store = LedgerStore::default().with_orphan_policy(OrphanPolicy::Record);
        let tx = store
            .add_transaction(TransactionDraft::paid(Uuid::new_v4(), 100, date()))
            .unwrap();

        assert_eq!(store.snapshot().transactions[0].id, tx.id);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = LedgerStore::default();
        let amina = store.add_customer(CustomerProfile::new("Amina"));
        store
            .add_transaction(TransactionDraft::taken(amina.id, 100, date()))
            .unwrap();
        store.update_business_info(BusinessInfo {
            name: "Corner Shop".into(),
            owner: "Hodan".into(),
            currency: "KES".into(),
        });

        store.reset_data();

        assert_eq!(*store.snapshot(), AppState::default());
    }
}
