//! Ledger reconciliation
//!
//! Pairs ledger events submitted by this deployment with the relational
//! receipts that should accompany them, verifies every order row against its
//! latest ledger event, and exits non-zero when anything disagrees.
//!
//! `reconcile --all` scans the whole ledger instead of the recent window;
//! `--json` also prints the scan report to stdout.

use event_ledger::Ledger;
use order_core::{Auditor, Config, CoreContext};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = match std::env::var("ORDER_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    if config.signing_seed.is_none() {
        anyhow::bail!("a signing seed is required to recognise this deployment's events");
    }

    let full_scan = std::env::args().any(|arg| arg == "--all");

    let ledger = Arc::new(Ledger::open(config.ledger.clone()).await?);
    let ctx = CoreContext::open(config, ledger.clone())?;
    let auditor = Auditor::new(ctx.clone());

    let report = if full_scan {
        auditor.scan_all().await?
    } else {
        auditor.scan_recent().await?
    };

    tracing::info!(
        from = ?report.from_offset,
        to = ?report.to_offset,
        matched = report.matched,
        foreign = report.foreign,
        orphaned = report.orphaned.len(),
        mismatched = report.mismatched.len(),
        "Ledger scan complete"
    );

    if std::env::args().any(|arg| arg == "--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    for event in &report.orphaned {
        tracing::error!(
            tx_ref = %event.tx_ref,
            offset = event.offset,
            correlation_id = %event.correlation_id,
            kind = %event.kind,
            "Orphaned ledger event"
        );
    }

    let mut inconsistent_rows = 0usize;
    for order in ctx.store.orders()? {
        let verification = auditor.verify_order(&order.id).await?;
        if !verification.is_consistent() {
            inconsistent_rows += 1;
            tracing::error!(
                order_id = %order.id,
                tx_ref = ?verification.tx_ref,
                verdict = ?verification.verdict,
                "Order row disagrees with ledger"
            );
        }
    }
    for shipment in ctx.store.shipments()? {
        let verification = auditor.verify_shipment(&shipment.id).await?;
        if !verification.is_consistent() {
            inconsistent_rows += 1;
            tracing::error!(
                shipment_id = %shipment.id,
                tx_ref = ?verification.tx_ref,
                verdict = ?verification.verdict,
                "Shipment row disagrees with ledger"
            );
        }
    }

    ledger.shutdown().await?;

    if !report.is_clean() || inconsistent_rows > 0 {
        tracing::error!(inconsistent_rows, "Reconciliation found discrepancies");
        std::process::exit(1);
    }

    tracing::info!("Ledger and relational state agree");
    Ok(())
}
