use anyhow::{Context, Result};
use std::io::Read;
use tracing::info;

use crate::application::LedgerService;
use crate::domain::{AppState, IntegrityReport, check_integrity, rebuild_balances};

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Parse and check the document without touching the ledger
    pub dry_run: bool,
    /// Derive every balance from the imported transactions instead of
    /// trusting the stored balances
    pub recompute_balances: bool,
}

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub customers: usize,
    pub transactions: usize,
    pub balances_rebuilt: usize,
    /// Integrity of the document as it will be (or would be) restored
    pub report: IntegrityReport,
    pub applied: bool,
}

/// Importer for loading a backup into the ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Replace the whole ledger with a JSON document of the exported shape.
    ///
    /// The current ledger is only replaced once the document parsed
    /// successfully, and it is replaced in a single step.
    pub fn import_full_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut state: AppState =
            serde_json::from_reader(reader).context("Backup is not a valid ledger document")?;

        let balances_rebuilt = if options.recompute_balances {
            rebuild_balances(&mut state).context("Backup balances cannot be rebuilt")?
        } else {
            0
        };
        let report = check_integrity(&state).context("Backup cannot be checked")?;

        let result = ImportResult {
            customers: state.customers.len(),
            transactions: state.transactions.len(),
            balances_rebuilt,
            report,
            applied: !options.dry_run,
        };

        if !options.dry_run {
            self.service.restore(state);
            info!(
                customers = result.customers,
                transactions = result.transactions,
                "ledger restored from backup"
            );
        }

        Ok(result)
    }
}
