use ai4all_core::system::SystemProbe;
use ai4all_core::{Config, ModelRegistry};
use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::accounting::{AccountantWorker, UsageAccountant};
use crate::backend::BackendClient;
use crate::completion::CompletionGateway;
use crate::grants::{MemoryGrantStore, StarterGrantLedger};
use crate::ledger::LedgerClient;

pub struct AppState {
    pub config: Config,
    pub registry: Arc<ModelRegistry>,
    pub gateway: CompletionGateway,
    pub ledger: LedgerClient,
    pub grants: StarterGrantLedger,
    pub system: Mutex<SystemProbe>,
}

impl AppState {
    /// Build shared state and start the usage accountant. Must be called
    /// inside a tokio runtime.
    pub fn new(config: Config) -> Result<(Self, AccountantWorker)> {
        Self::with_registry(config, ModelRegistry::builtin())
    }

    pub fn with_registry(config: Config, registry: ModelRegistry) -> Result<(Self, AccountantWorker)> {
        let registry = Arc::new(registry);
        let backend = BackendClient::new(&config.backend)?;
        let ledger = LedgerClient::new(&config.ledger)?;

        let (accountant, worker) =
            UsageAccountant::spawn(Arc::new(ledger.clone()), config.ledger.queue_capacity);
        let gateway = CompletionGateway::new(registry.clone(), backend, accountant);
        let grants = StarterGrantLedger::new(
            Arc::new(MemoryGrantStore::default()),
            Arc::new(ledger.clone()),
        );

        tracing::info!(
            backend = %config.backend.url,
            ledger = %config.ledger.url,
            models = registry.list().len(),
            "Gateway state ready"
        );

        let state = Self {
            config,
            registry,
            gateway,
            ledger,
            grants,
            system: Mutex::new(SystemProbe::new()),
        };
        Ok((state, worker))
    }
}
