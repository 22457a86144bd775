mod common;

use anyhow::Result;
use debtbook::io::{Exporter, ImportOptions, Importer};
use serde_json::Value;

use common::{add_customer, pay, take, test_service};

#[tokio::test]
async fn test_full_export_imports_into_fresh_ledger() -> Result<()> {
    let (source, _source_dir) = test_service().await?;
    let amina = add_customer(&source, "Amina");
    let bashir = add_customer(&source, "Bashir");
    take(&source, &amina, 5000);
    pay(&source, &amina, 1250);
    take(&source, &bashir, 1);

    let mut buffer = Vec::new();
    let exported = Exporter::new(&source).export_full_json(&mut buffer)?;
    assert_eq!(exported, *source.snapshot());

    let (target, _target_dir) = test_service().await?;
    let result = Importer::new(&target).import_full_json(buffer.as_slice(), ImportOptions::default())?;

    assert!(result.applied);
    assert_eq!(result.customers, 2);
    assert_eq!(result.transactions, 3);
    assert!(result.report.is_healthy());
    assert_eq!(*target.snapshot(), *source.snapshot());

    source.close().await?;
    target.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_exported_document_uses_wire_shape() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let amina = add_customer(&service, "Amina");
    take(&service, &amina, 1999);

    let mut buffer = Vec::new();
    Exporter::new(&service).export_full_json(&mut buffer)?;
    let document: Value = serde_json::from_slice(&buffer)?;

    let customer = &document["customers"][0];
    assert_eq!(customer["name"], "Amina");
    assert_eq!(customer["balance"].as_f64(), Some(19.99));
    assert!(customer["createdAt"].is_string());

    let transaction = &document["transactions"][0];
    assert_eq!(transaction["type"], "TAKEN");
    assert_eq!(transaction["date"], "2024-05-01");
    assert_eq!(transaction["customerId"], amina.id.to_string());

    assert_eq!(document["businessInfo"]["name"], "My Business");

    service.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_dry_run_import_leaves_ledger_untouched() -> Result<()> {
    let (source, _source_dir) = test_service().await?;
    let amina = add_customer(&source, "Amina");
    take(&source, &amina, 300);

    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer)?;

    let (target, _target_dir) = test_service().await?;
    add_customer(&target, "Bashir");
    let before = target.snapshot();

    let result = Importer::new(&target).import_full_json(
        buffer.as_slice(),
        ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        },
    )?;

    assert!(!result.applied);
    assert_eq!(result.customers, 1);
    assert_eq!(*target.snapshot(), *before);

    source.close().await?;
    target.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_recompute_balances_repairs_tampered_backup() -> Result<()> {
    let (source, _source_dir) = test_service().await?;
    let amina = add_customer(&source, "Amina");
    take(&source, &amina, 4000);
    pay(&source, &amina, 1000);

    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer)?;
    let mut document: Value = serde_json::from_slice(&buffer)?;
    document["customers"][0]["balance"] = Value::from(999.0);
    let tampered = serde_json::to_vec(&document)?;

    let (target, _target_dir) = test_service().await?;

    let trusted = Importer::new(&target).import_full_json(
        tampered.as_slice(),
        ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        },
    )?;
    assert!(!trusted.report.is_healthy());
    assert_eq!(trusted.report.mismatches.len(), 1);

    let repaired = Importer::new(&target).import_full_json(
        tampered.as_slice(),
        ImportOptions {
            recompute_balances: true,
            ..ImportOptions::default()
        },
    )?;
    assert_eq!(repaired.balances_rebuilt, 1);
    assert!(repaired.report.is_healthy());
    assert_eq!(target.get_customer(amina.id)?.balance, 3000);

    source.close().await?;
    target.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_backup_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    add_customer(&service, "Amina");
    let before = service.snapshot();

    let result = Importer::new(&service)
        .import_full_json(&b"{\"customers\": \"nope\"}"[..], ImportOptions::default());

    assert!(result.is_err());
    assert_eq!(*service.snapshot(), *before);

    service.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_csv_exports() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let amina = add_customer(&service, "Amina, Jr.");
    take(&service, &amina, 1050);
    pay(&service, &amina, 50);

    let mut customers = Vec::new();
    let count = Exporter::new(&service).export_customers_csv(&mut customers)?;
    assert_eq!(count, 1);
    let customers = String::from_utf8(customers)?;
    let mut lines = customers.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,phone,email,address,balance,created_at")
    );
    let row = lines.next().unwrap_or_default();
    assert!(row.contains("\"Amina, Jr.\""));
    assert!(row.contains(",10.00,"));

    let mut transactions = Vec::new();
    let count = Exporter::new(&service).export_transactions_csv(&mut transactions)?;
    assert_eq!(count, 2);
    let transactions = String::from_utf8(transactions)?;
    let rows: Vec<&str> = transactions.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].contains(",PAID,"));
    assert!(rows[2].contains(",TAKEN,"));

    service.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_backup_with_sums_beyond_range_is_rejected() -> Result<()> {
    let (source, _source_dir) = test_service().await?;
    let amina = add_customer(&source, "Amina");
    take(&source, &amina, 100);
    take(&source, &amina, 100);

    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer)?;
    let mut document: Value = serde_json::from_slice(&buffer)?;
    // Each amount is in range on its own; together they are not
    for index in 0..2 {
        document["transactions"][index]["amount"] = Value::from(50_000_000_000_000.0);
    }
    let oversized = serde_json::to_vec(&document)?;

    let (target, _target_dir) = test_service().await?;
    let before = target.snapshot();

    for recompute_balances in [false, true] {
        let result = Importer::new(&target).import_full_json(
            oversized.as_slice(),
            ImportOptions {
                recompute_balances,
                ..ImportOptions::default()
            },
        );
        assert!(result.is_err());
    }
    assert_eq!(*target.snapshot(), *before);

    source.close().await?;
    target.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_backup_with_amount_beyond_range_is_rejected() -> Result<()> {
    let (source, _source_dir) = test_service().await?;
    let amina = add_customer(&source, "Amina");
    take(&source, &amina, 100);

    let mut buffer = Vec::new();
    Exporter::new(&source).export_full_json(&mut buffer)?;
    let mut document: Value = serde_json::from_slice(&buffer)?;
    document["transactions"][0]["amount"] = Value::from(1e300);
    let oversized = serde_json::to_vec(&document)?;

    let (target, _target_dir) = test_service().await?;
    let result =
        Importer::new(&target).import_full_json(oversized.as_slice(), ImportOptions::default());

    let error = result
        .err()
        .ok_or_else(|| anyhow::anyhow!("oversized backup was imported"))?;
    assert!(format!("{error:#}").contains("out of range"));
    assert!(target.snapshot().transactions.is_empty());

    source.close().await?;
    target.close().await?;
    Ok(())
}
