//! Standalone ledger node
//!
//! Opens the ledger, checks the most recent window of the hash chain and
//! runs until interrupted.

use event_ledger::{Config, Ledger};

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
    let config = match std::env::var("LEDGER_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        data_dir = ?config.data_dir,
        "Starting event ledger node"
    );

    let ledger = Ledger::open(config).await?;

    match ledger.latest_offset()? {
        Some(head) => {
            let from = head.saturating_sub(ledger.max_read_window() - 1);
            ledger.verify_chain(from, head)?;
            tracing::info!(head, from, "Hash chain verified");
        }
        None => tracing::info!("Ledger is empty"),
    }

    let stats = ledger.storage().get_stats()?;
    tracing::info!(
        approximate_events = stats.approximate_events,
        "Ledger opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger node");
    ledger.flush_batch().await?;
    ledger.shutdown().await?;
    Ok(())
}
