use anyhow::Result;
use chrono::NaiveDate;
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{AppState, format_cents};

/// Default backup file name for a given day, e.g. `debtbook_backup_2024-05-01.json`.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("debtbook_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the whole ledger as the JSON document it is persisted as.
    /// The document carries no version field; importers accept exactly this shape.
    pub fn export_full_json<W: Write>(&self, writer: W) -> Result<AppState> {
        let snapshot = self.service.snapshot();
        write_json(&snapshot, writer)?;
        Ok(AppState::clone(&snapshot))
    }

    /// Export customers with their balances to CSV format
    pub fn export_customers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let snapshot = self.service.snapshot();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "phone",
            "email",
            "address",
            "balance",
            "created_at",
        ])?;

        for customer in &snapshot.customers {
            csv_writer.write_record([
                customer.id.to_string(),
                customer.name.clone(),
                customer.phone.clone(),
                customer.email.clone(),
                customer.address.clone(),
                format_cents(customer.balance),
                customer.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(snapshot.customers.len())
    }

    /// Export transactions, newest first, to CSV format
    pub fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let snapshot = self.service.snapshot();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "customer",
            "type",
            "item",
            "description",
            "amount",
            "created_at",
        ])?;

        for transaction in &snapshot.transactions {
            let customer_name = snapshot
                .customer(transaction.customer_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| transaction.customer_id.to_string());

            csv_writer.write_record([
                transaction.id.to_string(),
                transaction.date.format("%Y-%m-%d").to_string(),
                customer_name,
                transaction.transaction_type.as_str().to_string(),
                transaction.item.clone(),
                transaction.description.clone(),
                format_cents(transaction.amount),
                transaction.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(snapshot.transactions.len())
    }
}

fn write_json<W: Write>(state: &AppState, mut writer: W) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    writer.write_all(json.as_bytes())?;
    writer.flush()?;
    Ok(())
}
