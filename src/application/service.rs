use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{
    AppState, BusinessInfo, Cents, Customer, CustomerId, CustomerProfile, CustomerUpdate,
    IntegrityReport, OrphanPolicy, Transaction, TransactionDraft, TransactionId,
    cents_in_range, check_integrity,
};
use crate::storage::Backend;

use super::reporting::{self, CustomerStatement, DashboardSummary};
use super::{AppError, LedgerStore};

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// It owns the [`LedgerStore`], validates input before it reaches the store,
/// and keeps the storage backend up to date: a background task saves every
/// published snapshot. Bursts of changes coalesce into a single save of the
/// newest snapshot. Call [`LedgerService::close`] to wait for the last save.
pub struct LedgerService {
    store: LedgerStore,
    backend: Arc<Backend>,
    persister: JoinHandle<anyhow::Result<()>>,
}

impl LedgerService {
    /// Load the ledger from `backend` and start persisting changes to it.
    pub async fn open(backend: Backend, orphan_policy: OrphanPolicy) -> Result<Self, AppError> {
        let state = backend.load_state().await?;
        debug!(
            customers = state.customers.len(),
            transactions = state.transactions.len(),
            "ledger loaded"
        );

        let store = LedgerStore::new(state).with_orphan_policy(orphan_policy);
        let backend = Arc::new(backend);
        let persister = tokio::spawn(persist_changes(store.subscribe(), Arc::clone(&backend)));

        Ok(Self {
            store,
            backend,
            persister,
        })
    }

    /// Stop accepting changes and wait until the newest snapshot is stored.
    ///
    /// Fails if the newest snapshot could not be written.
    pub async fn close(self) -> Result<(), AppError> {
        let Self {
            store, persister, ..
        } = self;
        drop(store);
        persister
            .await
            .map_err(|e| AppError::Storage(anyhow::anyhow!("persister task failed: {}", e)))??;
        Ok(())
    }

    /// Store the current snapshot immediately, without waiting for the
    /// background task.
    pub async fn save_now(&self) -> Result<(), AppError> {
        self.backend.save_state(&self.snapshot()).await?;
        Ok(())
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<AppState> {
        self.store.snapshot()
    }

    // ========================
    // Customer operations
    // ========================

    /// Add a customer. The name must not be blank.
    pub fn add_customer(&self, profile: CustomerProfile) -> Result<Customer, AppError> {
        let profile = CustomerProfile {
            name: require_name(&profile.name)?,
            ..profile
        };
        Ok(self.store.add_customer(profile))
    }

    /// Edit a customer's profile. A provided name must not be blank.
    pub fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, AppError> {
        let update = CustomerUpdate {
            name: update.name.as_deref().map(require_name).transpose()?,
            ..update
        };
        self.store
            .update_customer(id, update)
            .ok_or_else(|| AppError::customer_not_found(id))
    }

    /// Delete a customer and every transaction it owns.
    pub fn delete_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.store
            .delete_customer(id)
            .ok_or_else(|| AppError::customer_not_found(id))
    }

    pub fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.snapshot()
            .customer(id)
            .cloned()
            .ok_or_else(|| AppError::customer_not_found(id))
    }

    /// Resolve a customer by id, or by a case-insensitive exact name match.
    pub fn find_customer(&self, key: &str) -> Result<Customer, AppError> {
        let snapshot = self.snapshot();
        if let Ok(id) = uuid::Uuid::parse_str(key) {
            return snapshot
                .customer(id)
                .cloned()
                .ok_or_else(|| AppError::customer_not_found(id));
        }

        let needle = key.trim().to_lowercase();
        let matches: Vec<&Customer> = snapshot
            .customers
            .iter()
            .filter(|c| c.name.to_lowercase() == needle)
            .collect();

        match matches.as_slice() {
            [customer] => Ok((*customer).clone()),
            [] => Err(AppError::CustomerNotFound(key.to_string())),
            many => Err(AppError::AmbiguousCustomer {
                name: key.to_string(),
                count: many.len(),
            }),
        }
    }

    pub fn list_customers(&self, search: Option<&str>) -> Vec<Customer> {
        reporting::search_customers(&self.snapshot(), search.unwrap_or(""))
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a transaction. The amount must be positive.
    pub fn add_transaction(&self, draft: TransactionDraft) -> Result<Transaction, AppError> {
        require_positive(draft.amount)?;
        Ok(self.store.add_transaction(draft)?)
    }

    /// Delete a transaction, undoing its effect on the owner's balance.
    pub fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.store
            .delete_transaction(id)?
            .ok_or(AppError::TransactionNotFound(id))
    }

    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.snapshot()
            .transaction(id)
            .cloned()
            .ok_or(AppError::TransactionNotFound(id))
    }

    /// List transactions newest first, optionally narrowed by a search term
    /// and a customer.
    pub fn list_transactions(
        &self,
        search: Option<&str>,
        customer: Option<CustomerId>,
        limit: Option<usize>,
    ) -> Vec<Transaction> {
        let mut transactions =
            reporting::search_transactions(&self.snapshot(), search.unwrap_or(""), customer);
        if let Some(limit) = limit {
            transactions.truncate(limit);
        }
        transactions
    }

    // ========================
    // Business and whole-ledger operations
    // ========================

    pub fn business_info(&self) -> BusinessInfo {
        self.snapshot().business_info.clone()
    }

    pub fn update_business_info(&self, info: BusinessInfo) {
        self.store.update_business_info(info);
    }

    /// Erase every customer and transaction.
    pub fn reset_data(&self) {
        self.store.reset_data();
        info!("ledger data reset");
    }

    /// Replace the whole ledger, e.g. from an imported backup.
    pub fn restore(&self, state: AppState) {
        self.store.restore(state);
    }

    // ========================
    // Reports
    // ========================

    pub fn dashboard(&self) -> Result<DashboardSummary, AppError> {
        Ok(reporting::dashboard(&self.snapshot())?)
    }

    pub fn customer_statement(&self, id: CustomerId) -> Result<CustomerStatement, AppError> {
        reporting::customer_statement(&self.snapshot(), id)?
            .ok_or_else(|| AppError::customer_not_found(id))
    }

    pub fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        Ok(check_integrity(&self.snapshot())?)
    }
}

fn require_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn require_positive(amount: Cents) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if !cents_in_range(amount) {
        return Err(AppError::InvalidAmount("Amount is too large".to_string()));
    }
    Ok(())
}

/// Save each published snapshot until the store is dropped, then make sure
/// the last one reached the backend.
///
/// A failed save is logged and retried with the next snapshot. If the newest
/// snapshot is still unsaved once the store is gone, one more attempt is made
/// and its error is returned.
async fn persist_changes(
    mut changes: watch::Receiver<Arc<AppState>>,
    backend: Arc<Backend>,
) -> anyhow::Result<()> {
    let mut last_saved = changes.borrow_and_update().clone();

    while changes.changed().await.is_ok() {
        let snapshot = changes.borrow_and_update().clone();
        match save_snapshot(&backend, &snapshot).await {
            Ok(()) => last_saved = snapshot,
            Err(e) => error!(error = %e, "failed to save ledger"),
        }
    }

    let latest = changes.borrow().clone();
    if !Arc::ptr_eq(&latest, &last_saved) {
        save_snapshot(&backend, &latest).await?;
    }
    Ok(())
}

async fn save_snapshot(backend: &Backend, snapshot: &AppState) -> anyhow::Result<()> {
    backend.save_state(snapshot).await?;
    debug!(
        customers = snapshot.customers.len(),
        transactions = snapshot.transactions.len(),
        "ledger saved"
    );
    Ok(())
}
