use crate::backend::BackendClient;
use crate::client_store::ClientStore;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::notices::Notices;
use crate::storage::{FileStorage, KeyValueStore};
use crate::viacep::AddressLookupClient;
use std::sync::Arc;

/// Shared dependencies handed to every screen controller.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: ClientStore,
    pub backend: Arc<BackendClient>,
    pub address: Arc<AddressLookupClient>,
    pub notices: Notices,
}

impl AppContext {
    pub fn new(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        notices: Notices,
    ) -> Result<Self, AppError> {
        let store = ClientStore::open(storage);
        let backend = BackendClient::from_config(&config, store.clone())
            .context("Failed to initialize backend client")?;
        let address =
            AddressLookupClient::from_config(&config).context("Failed to initialize ViaCEP client")?;

        Ok(Self {
            config: Arc::new(config),
            store,
            backend: Arc::new(backend),
            address: Arc::new(address),
            notices,
        })
    }

    /// Context backed by the on-disk storage directory from `config`.
    pub fn with_file_storage(config: Config, notices: Notices) -> Result<Self, AppError> {
        let storage = FileStorage::new(&config.storage_dir)
            .context("Failed to open local storage directory")?;
        Self::new(config, Arc::new(storage), notices)
    }
}
