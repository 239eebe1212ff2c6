//! Shared handles passed to every engine

use crate::config::Config;
use crate::gateway::LedgerGateway;
use crate::locks::EntityLocks;
use crate::metrics::Metrics;
use crate::store::StateStore;
use crate::{Error, Result};
use event_ledger::{KeyPair, LedgerService};
use std::sync::Arc;

/// State store, ledger gateway and lock registry of one process
///
/// Cloning is cheap; clones share the same store, gateway and locks.
#[derive(Debug, Clone)]
pub struct CoreContext {
    /// Relational state
    pub store: Arc<StateStore>,
    /// Ledger client
    pub gateway: Arc<LedgerGateway>,
    /// Per-entity serialization
    pub locks: EntityLocks,
    /// Metrics
    pub metrics: Metrics,
    /// Configuration
    pub config: Arc<Config>,
}

impl CoreContext {
    /// Open the state store under `config.data_dir` and connect to `ledger`
    ///
    /// Submissions are signed with the configured seed. Without one, a fresh
    /// key is generated and events from earlier runs are no longer
    /// recognised as this process's own.
    pub fn open(config: Config, ledger: Arc<dyn LedgerService>) -> Result<Self> {
        config.validate()?;

        let keypair = match &config.signing_seed {
            Some(seed) => KeyPair::from_hex_seed(seed)?,
            None => {
                tracing::warn!("No signing seed configured, using an ephemeral key");
                KeyPair::generate()
            }
        };

        let store = Arc::new(StateStore::open(&config)?);
        Self::with_parts(config, store, ledger, keypair)
    }

    /// Assemble from an already opened store
    pub fn with_parts(
        config: Config,
        store: Arc<StateStore>,
        ledger: Arc<dyn LedgerService>,
        keypair: KeyPair,
    ) -> Result<Self> {
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("metrics registry: {}", e)))?;

        let gateway = Arc::new(LedgerGateway::new(
            ledger,
            keypair,
            config.append_timeout(),
            metrics.clone(),
        ));

        tracing::info!(
            service = %config.service_name,
            submitter = %gateway.submitter_id(),
            append_timeout_ms = config.append_timeout_ms,
            "Order core ready"
        );

        Ok(Self {
            store,
            gateway,
            locks: EntityLocks::new(),
            metrics,
            config: Arc::new(config),
        })
    }
}
