// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use debtbook::application::LedgerService;
use debtbook::domain::{Cents, Customer, CustomerProfile, OrphanPolicy, TransactionDraft};
use debtbook::storage::Backend;
use tempfile::TempDir;

/// Helper to open a service on a temporary SQLite database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = open_sqlite(&temp_dir).await?;
    Ok((service, temp_dir))
}

/// Open (or reopen) the SQLite ledger inside `dir`
pub async fn open_sqlite(dir: &TempDir) -> Result<LedgerService> {
    let db_path = dir.path().join("test.db");
    let backend = Backend::sqlite(db_path.to_str().unwrap(), "test_slot").await?;
    Ok(LedgerService::open(backend, OrphanPolicy::Reject).await?)
}

/// Open (or reopen) the JSON-file ledger inside `dir`
pub async fn open_json(dir: &TempDir) -> Result<LedgerService> {
    let backend = Backend::json_file(dir.path().join("ledger.json"));
    Ok(LedgerService::open(backend, OrphanPolicy::Reject).await?)
}

/// Helper to parse a date string into a NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

pub fn add_customer(service: &LedgerService, name: &str) -> Customer {
    service.add_customer(CustomerProfile::new(name)).unwrap()
}

pub fn take(service: &LedgerService, customer: &Customer, amount: Cents) -> uuid::Uuid {
    service
        .add_transaction(TransactionDraft::taken(customer.id, amount, parse_date("2024-05-01")))
        .unwrap()
        .id
}

pub fn pay(service: &LedgerService, customer: &Customer, amount: Cents) -> uuid::Uuid {
    service
        .add_transaction(TransactionDraft::paid(customer.id, amount, parse_date("2024-05-02")))
        .unwrap()
        .id
}

pub fn balance_of(service: &LedgerService, customer: &Customer) -> Cents {
    service.get_customer(customer.id).unwrap().balance
}
