use crate::api::CompanionApiProvider;
use crate::config::AppConfig;
use crate::storage::StorageManager;
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::Mutex;

// Handles shared by every command
#[derive(Clone)]
pub struct AppState {
    // The mutex serializes read-modify-write sequences on the cache (credit top-ups)
    pub storage: Arc<Mutex<StorageManager>>,
    pub api_provider: Arc<dyn CompanionApiProvider>,
    pub store: Arc<Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(storage_manager: StorageManager, api_provider: Arc<dyn CompanionApiProvider>, config: AppConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage_manager)),
            api_provider,
            store: Arc::new(Store::default()),
            config: Arc::new(config),
        }
    }
}
