// Declare the modules
pub mod api;
pub mod commands;
pub mod config;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;

use crate::api::{CompanionApiProvider, HttpApiProvider};
use crate::commands::InitialRoute;
use crate::config::AppConfig;
use crate::state::AppState;
use crate::storage::StorageManager;
use anyhow::Context;
use std::sync::Arc;

/// Opens the cache and wires the backend client into a fresh [`AppState`].
pub async fn build_state(config: AppConfig) -> Result<AppState, anyhow::Error> {
    let storage_manager = StorageManager::new(&config.database_path).await?;
    let api_provider: Arc<dyn CompanionApiProvider> =
        Arc::new(HttpApiProvider::new(config.clone()).context("Failed to build HTTP client")?);
    Ok(AppState::new(storage_manager, api_provider, config))
}

/// Headless launch: loads config, hydrates state from cache and backend, and logs where the UI would start.
pub fn run() -> Result<(), anyhow::Error> {
    // Initialize logging
    env_logger::init();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let config = AppConfig::from_env()?;
        let app_state = build_state(config).await?;

        let outcome = commands::bootstrap(&app_state).await;
        match outcome.route {
            InitialRoute::Onboarding => log::info!("Initial route: onboarding"),
            InitialRoute::MainTabs => log::info!(
                "Initial route: main tabs (remote profile refreshed: {})",
                outcome.remote_profile.is_some()
            ),
        }

        let snapshot = app_state.store.snapshot();
        log::info!(
            "State ready: credit {}, {} contacts, {} unread, theme {}",
            snapshot.credit.user_credit,
            snapshot.chat.contacts.len(),
            snapshot.chat.total_unread(),
            commands::load_theme(&app_state).await
        );
        Ok::<(), anyhow::Error>(())
    })
}
