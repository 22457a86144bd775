use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::application::LedgerService;
use crate::domain::{
    BusinessInfo, Cents, CustomerProfile, CustomerUpdate, OrphanPolicy, Transaction,
    TransactionDraft, TransactionType, format_cents, parse_cents,
};
use crate::storage::{Backend, DEFAULT_SLOT};

/// Debtbook - who owes how much
#[derive(Parser)]
#[command(name = "debtbook")]
#[command(about = "A local-first ledger of customer debts and payments")]
#[command(version)]
pub struct Cli {
    /// Database file path (defaults to debtbook.db, or debtbook.json for the json backend)
    #[arg(short, long, env = "DEBTBOOK_DATABASE", global = true)]
    pub database: Option<String>,

    /// Storage backend
    #[arg(long, value_enum, env = "DEBTBOOK_BACKEND", default_value = "sqlite", global = true)]
    pub backend: BackendKind,

    /// Slot name inside the SQLite database
    #[arg(long, env = "DEBTBOOK_SLOT", default_value = DEFAULT_SLOT, global = true)]
    pub slot: String,

    /// Record transactions even when their customer does not exist
    #[arg(long, global = true)]
    pub allow_orphans: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Sqlite,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the ledger storage if it does not exist yet
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Record goods or services a customer took on credit
    Take(EntryArgs),

    /// Record a payment from a customer
    Pay(EntryArgs),

    /// List transactions, newest first
    Transactions {
        /// Case-insensitive match on item, description or customer name
        #[arg(short, long)]
        search: Option<String>,

        /// Only show this customer's transactions (name or id)
        #[arg(short, long)]
        customer: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show detailed transaction information
    #[command(name = "show")]
    ShowTransaction {
        /// Transaction ID
        id: String,
    },

    /// Delete a transaction and undo its effect on the balance
    DeleteTransaction {
        /// Transaction ID
        id: String,
    },

    /// Business details
    #[command(subcommand)]
    Business(BusinessCommands),

    /// Totals across all customers
    Dashboard,

    /// List the ledgers stored in the SQLite database
    Slots,

    /// Verify that every balance matches its transactions
    Check,

    /// Delete ALL customers and transactions
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Export data to JSON or CSV
    Export {
        /// What to export: full, customers, transactions
        #[arg(default_value = "full")]
        export_type: String,

        /// Output file ("-" for stdout). A full export defaults to a dated backup file.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replace the ledger with a JSON backup
    Import {
        /// Input file (stdin if omitted)
        input: Option<String>,

        /// Check the backup without importing
        #[arg(long)]
        dry_run: bool,

        /// Derive balances from the imported transactions
        #[arg(long)]
        recompute_balances: bool,
    },
}

#[derive(clap::Args)]
pub struct EntryArgs {
    /// Customer name or id
    pub customer: String,

    /// Amount (e.g., "50.00" or "50")
    pub amount: String,

    /// What was taken or paid for
    #[arg(short, long, default_value = "")]
    pub item: String,

    /// Free-text note
    #[arg(short = 'n', long, default_value = "")]
    pub description: String,

    /// Business date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Add a new customer
    Add {
        /// Customer name
        name: String,

        #[arg(short, long, default_value = "")]
        phone: String,

        #[arg(short, long, default_value = "")]
        email: String,

        #[arg(short, long, default_value = "")]
        address: String,
    },

    /// List customers, largest balance first
    List {
        /// Case-insensitive match on name, or a phone fragment
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a customer's details and history
    Show {
        /// Customer name or id
        customer: String,
    },

    /// Edit a customer's contact details
    Edit {
        /// Customer name or id
        customer: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },

    /// Delete a customer and all of their transactions
    Delete {
        /// Customer name or id
        customer: String,
    },
}

#[derive(Subcommand)]
pub enum BusinessCommands {
    /// Show business details
    Show,

    /// Change business details
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        owner: Option<String>,

        /// Currency symbol printed before amounts
        #[arg(long)]
        currency: Option<String>,
    },
}

impl Cli {
    fn database_path(&self) -> String {
        match (&self.database, self.backend) {
            (Some(path), _) => path.clone(),
            (None, BackendKind::Sqlite) => "debtbook.db".to_string(),
            (None, BackendKind::Json) => "debtbook.json".to_string(),
        }
    }

    async fn open_backend(&self) -> Result<Backend> {
        let path = self.database_path();
        match self.backend {
            BackendKind::Sqlite => Backend::sqlite(&path, self.slot.clone())
                .await
                .with_context(|| format!("Failed to open database: {}", path)),
            BackendKind::Json => Ok(Backend::json_file(path)),
        }
    }

    fn orphan_policy(&self) -> OrphanPolicy {
        if self.allow_orphans {
            OrphanPolicy::Record
        } else {
            OrphanPolicy::Reject
        }
    }

    pub async fn run(self) -> Result<()> {
        let backend = self.open_backend().await?;
        let service = LedgerService::open(backend, self.orphan_policy()).await?;

        let outcome = self.dispatch(&service).await;

        // Flush whatever was changed, even if the command itself failed
        service.close().await?;
        outcome
    }

    async fn dispatch(&self, service: &LedgerService) -> Result<()> {
        match &self.command {
            Commands::Init => {
                // Write the (possibly empty) ledger so the storage exists on disk
                service.save_now().await?;
                println!("Ledger ready: {}", self.database_path());
            }

            Commands::Customer(cmd) => run_customer_command(service, cmd)?,

            Commands::Take(args) => run_entry_command(service, TransactionType::Taken, args)?,

            Commands::Pay(args) => run_entry_command(service, TransactionType::Paid, args)?,

            Commands::Transactions {
                search,
                customer,
                limit,
            } => {
                let customer_id = customer
                    .as_deref()
                    .map(|key| service.find_customer(key).map(|c| c.id))
                    .transpose()?;
                let transactions =
                    service.list_transactions(search.as_deref(), customer_id, *limit);
                print_transactions(service, &transactions);
            }

            Commands::ShowTransaction { id } => {
                let transaction = service.get_transaction(parse_id(id)?)?;
                run_show_transaction(service, &transaction);
            }

            Commands::DeleteTransaction { id } => {
                let removed = service.delete_transaction(parse_id(id)?)?;
                let currency = service.business_info().currency;
                println!(
                    "Deleted {} {}{} ({})",
                    removed.transaction_type,
                    currency,
                    format_cents(removed.amount),
                    removed.id
                );
                if let Ok(customer) = service.get_customer(removed.customer_id) {
                    println!(
                        "  {} now owes {}{}",
                        customer.name,
                        currency,
                        format_cents(customer.balance)
                    );
                }
            }

            Commands::Business(cmd) => run_business_command(service, cmd),

            Commands::Dashboard => run_dashboard_command(service)?,

            Commands::Slots => run_slots_command(service).await?,

            Commands::Check => run_check_command(service)?,

            Commands::Reset { yes } => {
                if !yes {
                    anyhow::bail!("Refusing to delete all data without --yes");
                }
                service.reset_data();
                println!("All customers and transactions deleted.");
            }

            Commands::Export {
                export_type,
                output,
            } => run_export_command(service, export_type, output.as_deref())?,

            Commands::Import {
                input,
                dry_run,
                recompute_balances,
            } => run_import_command(service, input.as_deref(), *dry_run, *recompute_balances)?,
        }

        Ok(())
    }
}

fn run_customer_command(service: &LedgerService, cmd: &CustomerCommands) -> Result<()> {
    let currency = service.business_info().currency;

    match cmd {
        CustomerCommands::Add {
            name,
            phone,
            email,
            address,
        } => {
            let customer = service.add_customer(
                CustomerProfile::new(name.as_str())
                    .with_phone(phone.as_str())
                    .with_email(email.as_str())
                    .with_address(address.as_str()),
            )?;
            println!("Added customer: {} ({})", customer.name, customer.id);
        }

        CustomerCommands::List { search } => {
            let customers = service.list_customers(search.as_deref());
            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!("{:<24} {:<16} {:>12}", "NAME", "PHONE", "BALANCE");
                println!("{}", "-".repeat(54));
                for customer in customers {
                    println!(
                        "{:<24} {:<16} {:>12}",
                        truncate(&customer.name, 24),
                        truncate(&customer.phone, 16),
                        money(&currency, customer.balance)
                    );
                }
            }
        }

        CustomerCommands::Show { customer } => {
            let customer = service.find_customer(customer)?;
            let statement = service.customer_statement(customer.id)?;
            let customer = &statement.customer;

            println!("Customer: {}", customer.name);
            println!("  ID:       {}", customer.id);
            if !customer.phone.is_empty() {
                println!("  Phone:    {}", customer.phone);
            }
            if !customer.email.is_empty() {
                println!("  Email:    {}", customer.email);
            }
            if !customer.address.is_empty() {
                println!("  Address:  {}", customer.address);
            }
            println!(
                "  Created:  {}",
                customer.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Taken:    {}", money(&currency, statement.total_taken));
            println!("  Paid:     {}", money(&currency, statement.total_paid));
            println!(
                "  Balance:  {}  {}",
                money(&currency, customer.balance),
                if customer.owes_money() { "owes" } else { "settled" }
            );
            println!();
            print_transactions(service, &statement.transactions);
        }

        CustomerCommands::Edit {
            customer,
            name,
            phone,
            email,
            address,
        } => {
            let update = CustomerUpdate {
                name: name.clone(),
                phone: phone.clone(),
                email: email.clone(),
                address: address.clone(),
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to change. Use --name, --phone, --email or --address");
            }
            let id = service.find_customer(customer)?.id;
            let updated = service.update_customer(id, update)?;
            println!("Updated customer: {}", updated.name);
        }

        CustomerCommands::Delete { customer } => {
            let id = service.find_customer(customer)?.id;
            let removed_transactions = service.list_transactions(None, Some(id), None).len();
            let removed = service.delete_customer(id)?;
            println!(
                "Deleted customer: {} ({} transaction(s) removed)",
                removed.name, removed_transactions
            );
        }
    }
    Ok(())
}

fn run_entry_command(
    service: &LedgerService,
    transaction_type: TransactionType,
    args: &EntryArgs,
) -> Result<()> {
    let amount =
        parse_cents(&args.amount).context("Invalid amount format. Use '50.00' or '50'")?;

    let date = match &args.date {
        Some(date_str) => parse_date(date_str)
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))?,
        None => Utc::now().date_naive(),
    };

    // An unknown name is reported here; an unknown id is left to the orphan policy
    let customer_id = match Uuid::parse_str(&args.customer) {
        Ok(id) => id,
        Err(_) => service.find_customer(&args.customer)?.id,
    };

    let draft = TransactionDraft::new(customer_id, transaction_type, amount, date)
        .with_item(args.item.as_str())
        .with_description(args.description.as_str());
    let transaction = service.add_transaction(draft)?;

    let currency = service.business_info().currency;
    println!(
        "Recorded {}: {} ({})",
        transaction.transaction_type,
        money(&currency, transaction.amount),
        transaction.id
    );
    if let Ok(customer) = service.get_customer(customer_id) {
        println!(
            "  {} balance: {}",
            customer.name,
            money(&currency, customer.balance)
        );
    }
    Ok(())
}

fn run_show_transaction(service: &LedgerService, transaction: &Transaction) {
    let currency = service.business_info().currency;
    let customer_name = service
        .get_customer(transaction.customer_id)
        .map(|c| c.name)
        .unwrap_or_else(|_| "(missing customer)".to_string());

    println!("Transaction: {}", transaction.id);
    println!("  Date:        {}", transaction.date.format("%Y-%m-%d"));
    println!("  Type:        {}", transaction.transaction_type);
    println!("  Amount:      {}", money(&currency, transaction.amount));
    println!("  Customer:    {}", customer_name);
    if !transaction.item.is_empty() {
        println!("  Item:        {}", transaction.item);
    }
    if !transaction.description.is_empty() {
        println!("  Description: {}", transaction.description);
    }
    println!(
        "  Recorded at: {}",
        transaction.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn run_business_command(service: &LedgerService, cmd: &BusinessCommands) {
    match cmd {
        BusinessCommands::Show => {
            let info = service.business_info();
            println!("Business: {}", info.name);
            println!("  Owner:    {}", info.owner);
            println!("  Currency: {}", info.currency);
        }

        BusinessCommands::Set {
            name,
            owner,
            currency,
        } => {
            let current = service.business_info();
            let info = BusinessInfo {
                name: name.clone().unwrap_or(current.name),
                owner: owner.clone().unwrap_or(current.owner),
                currency: currency.clone().unwrap_or(current.currency),
            };
            service.update_business_info(info.clone());
            println!(
                "Business details saved: {} ({}, {})",
                info.name, info.owner, info.currency
            );
        }
    }
}

fn run_dashboard_command(service: &LedgerService) -> Result<()> {
    let info = service.business_info();
    let summary = service.dashboard()?;

    println!("{}", info.name);
    println!();
    println!(
        "  Total outstanding: {}",
        money(&info.currency, summary.total_outstanding)
    );
    println!(
        "  Total paid:        {}",
        money(&info.currency, summary.total_paid)
    );
    println!(
        "  Customers:         {} ({} owing)",
        summary.customer_count, summary.customers_owing
    );
    println!();

    if summary.recent_transactions.is_empty() {
        println!("No transactions yet.");
    } else {
        println!("Recent transactions:");
        print_transactions(service, &summary.recent_transactions);
    }
    Ok(())
}

async fn run_slots_command(service: &LedgerService) -> Result<()> {
    let Backend::Sqlite { repo, slot: current } = service.backend() else {
        anyhow::bail!("Slots are only available with the sqlite backend");
    };

    let slots = repo.list_slots().await?;
    if slots.is_empty() {
        println!("No ledgers stored yet.");
        return Ok(());
    }

    println!("{:<2}{:<24} {:>10} {:<20}", "", "SLOT", "BYTES", "UPDATED");
    println!("{}", "-".repeat(58));
    for info in slots {
        let marker = if info.key == *current { "*" } else { "" };
        println!(
            "{:<2}{:<24} {:>10} {:<20}",
            marker,
            truncate(&info.key, 24),
            info.size,
            info.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity()?;
    let currency = service.business_info().currency;

    println!("Customers:    {}", report.customer_count);
    println!("Transactions: {}", report.transaction_count);
    println!(
        "Outstanding:  {}",
        money(&currency, report.total_outstanding)
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in report.issues() {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::{Exporter, backup_file_name};
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let path = match (output, export_type) {
        (Some("-"), _) => None,
        (Some(path), _) => Some(path.to_string()),
        (None, "full") => Some(backup_file_name(Utc::now().date_naive())),
        (None, _) => None,
    };

    let writer: Box<dyn Write> = match &path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "full" => {
            let snapshot = exporter.export_full_json(writer)?;
            if let Some(path) = &path {
                eprintln!(
                    "Exported backup to {}: {} customers, {} transactions",
                    path,
                    snapshot.customers.len(),
                    snapshot.transactions.len()
                );
            }
        }
        "customers" => {
            let count = exporter.export_customers_csv(writer)?;
            if path.is_some() {
                eprintln!("Exported {} customers", count);
            }
        }
        "transactions" => {
            let count = exporter.export_transactions_csv(writer)?;
            if path.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: full, customers, transactions",
                export_type
            );
        }
    }

    Ok(())
}

fn run_import_command(
    service: &LedgerService,
    input: Option<&str>,
    dry_run: bool,
    recompute_balances: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{Read, stdin};

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        recompute_balances,
    };
    let result = Importer::new(service).import_full_json(reader, options)?;

    if result.applied {
        println!("Import complete");
    } else {
        println!("Validation successful (nothing imported)");
    }
    println!("  Customers:        {}", result.customers);
    println!("  Transactions:     {}", result.transactions);
    if recompute_balances {
        println!("  Balances rebuilt: {}", result.balances_rebuilt);
    }

    if !result.report.is_healthy() {
        println!("\nWarnings:");
        for issue in result.report.issues().iter().take(10) {
            println!("  - {}", issue);
        }
    }

    Ok(())
}

fn print_transactions(service: &LedgerService, transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions found.");
        return;
    }

    let snapshot = service.snapshot();
    let currency = &snapshot.business_info.currency;

    println!(
        "{:<12} {:<6} {:>12} {:<18} {:<18} ID",
        "DATE", "TYPE", "AMOUNT", "CUSTOMER", "ITEM"
    );
    println!("{}", "-".repeat(106));

    for transaction in transactions {
        let customer_name = snapshot
            .customer(transaction.customer_id)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        let sign = match transaction.transaction_type {
            TransactionType::Taken => "+",
            TransactionType::Paid => "-",
        };

        println!(
            "{:<12} {:<6} {:>12} {:<18} {:<18} {}",
            transaction.date.format("%Y-%m-%d"),
            transaction.transaction_type,
            format!("{}{}", sign, money(currency, transaction.amount)),
            truncate(customer_name, 18),
            truncate(&transaction.item, 18),
            transaction.id
        );
    }
}

fn money(currency: &str, cents: Cents) -> String {
    format!("{}{}", currency, format_cents(cents))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid ID format (expected UUID)")
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").context("Date must be in YYYY-MM-DD format")
}
