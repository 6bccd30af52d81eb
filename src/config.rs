use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

// Defaults baked into the shipped mobile build
pub const DEFAULT_API_BASE_URL: &str = "http://116.203.250.18:8050/api";
pub const DEFAULT_PROJECT_ID: u32 = 5;
pub const DEFAULT_DATABASE_FILE: &str = "globalgpt.sqlite";

// --- Environment overrides ---

const ENV_API_URL: &str = "GLOBALGPT_API_URL";
const ENV_PROJECT_ID: &str = "GLOBALGPT_PROJECT_ID";
const ENV_DB_PATH: &str = "GLOBALGPT_DB_PATH";
const ENV_REQUEST_TIMEOUT: &str = "GLOBALGPT_REQUEST_TIMEOUT_SECS";

/// Runtime settings for the client core.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the backend, without trailing slash (e.g. `http://host:port/api`).
    pub api_base_url: String,
    /// Project id sent with user creation and chat requests.
    pub project_id: u32,
    /// Location of the SQLite file backing the key-value cache.
    pub database_path: PathBuf,
    /// Per-request timeout. `None` means requests may hang indefinitely, like the app does.
    pub request_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            project_id: DEFAULT_PROJECT_ID,
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            request_timeout: None,
        }
    }
}

impl AppConfig {
    /// Builds the configuration from defaults, overridden by `GLOBALGPT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = read_env(ENV_API_URL) {
            log::debug!("Using API base URL from environment variable: {}", ENV_API_URL);
            config.api_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(raw) = read_env(ENV_PROJECT_ID) {
            config.project_id = raw.trim().parse().context(format!(
                "Failed to parse project id from environment variable '{}'",
                ENV_PROJECT_ID
            ))?;
        }

        if let Some(path) = read_env(ENV_DB_PATH) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = read_env(ENV_REQUEST_TIMEOUT) {
            let secs: u64 = raw.trim().parse().context(format!(
                "Failed to parse request timeout from environment variable '{}'",
                ENV_REQUEST_TIMEOUT
            ))?;
            // Zero disables the timeout
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        log::info!(
            "Loaded config: api={}, project_id={}, db={}",
            config.api_base_url,
            config.project_id,
            config.database_path.display()
        );
        Ok(config)
    }

    /// Joins an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
