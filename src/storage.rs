use anyhow::Context;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool};
use std::path::Path;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::models::{ChatContact, ChatHistory, Theme};

// Flat key-value table standing in for the device cache
const MIGRATIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS key_value_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

// --- Cache keys ---

pub const THEME_KEY: &str = "@GlobalGpt_theme";
pub const ONBOARDING_COMPLETED_KEY: &str = "@GlobalGpt_onboarding_completed";
pub const USER_UUID_KEY: &str = "@GlobalGpt_user_uuid";
pub const USER_NAME_KEY: &str = "@GlobalGpt_user_name";
pub const CHAT_CONTACTS_KEY: &str = "@GlobalGpt_chat_contacts";
pub const CHAT_HISTORY_KEY: &str = "@GlobalGpt_chat_history";
pub const USER_CREDIT_KEY: &str = "@GlobalGpt_user_credit";

#[derive(Debug)]
pub struct StorageManager {
    pool: SqlitePool,
}

impl StorageManager {
    /// Opens (creating if needed) the cache database at `db_path` and runs migrations.
    pub async fn new(db_path: &Path) -> Result<Self, anyhow::Error> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.context("Failed to create database directory")?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        log::info!("Connecting to database: {}", db_url);

        if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            log::info!("Database file not found, creating...");
            Sqlite::create_database(&db_url).await.context("Failed to create database")?;
        }

        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database migrations completed.");
        Ok(())
    }

    // --- Raw key-value access ---

    /// Reads the raw value stored under `key`.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        log::debug!("Reading cache key: {}", key);
        let row = sqlx::query("SELECT value FROM key_value_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context(format!("Failed to read cache key '{}'", key))?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        log::debug!("Writing cache key: {} ({} bytes)", key, value.len());
        sqlx::query(
            r#"
            INSERT INTO key_value_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context(format!("Failed to write cache key '{}'", key))?;
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), anyhow::Error> {
        log::debug!("Removing cache key: {}", key);
        sqlx::query("DELETE FROM key_value_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .context(format!("Failed to remove cache key '{}'", key))?;
        Ok(())
    }

    /// Lists every key currently present, sorted.
    pub async fn all_keys(&self) -> Result<Vec<String>, anyhow::Error> {
        let rows = sqlx::query("SELECT key FROM key_value_store ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list cache keys")?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("key")).collect())
    }

    /// Wipes the whole cache.
    pub async fn clear_all(&self) -> Result<(), anyhow::Error> {
        log::warn!("Clearing every cache key");
        let result = sqlx::query("DELETE FROM key_value_store")
            .execute(&self.pool)
            .await
            .context("Failed to clear cache")?;
        log::info!("Removed {} cache entries", result.rows_affected());
        Ok(())
    }

    // Decodes a JSON value, falling back to `None` (with a warning) when it is malformed.
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, anyhow::Error> {
        let Some(raw) = self.get_item(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("Ignoring malformed JSON under cache key {}: {}", key, e);
                Ok(None)
            }
        }
    }

    // Decodes a JSON array element by element, skipping (with a warning) entries that do not decode.
    async fn get_json_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, anyhow::Error> {
        let Some(entries) = self.get_json::<Vec<serde_json::Value>>(key).await? else {
            return Ok(Vec::new());
        };
        let mut decoded = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value(entry) {
                Ok(value) => decoded.push(value),
                Err(e) => log::warn!("Skipping entry {} under cache key {}: {}", index, key, e),
            }
        }
        Ok(decoded)
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), anyhow::Error> {
        let raw = serde_json::to_string(value).context(format!("Failed to serialize value for '{}'", key))?;
        self.set_item(key, &raw).await
    }

    // --- Theme ---

    pub async fn get_theme(&self) -> Result<Option<Theme>, anyhow::Error> {
        let Some(raw) = self.get_item(THEME_KEY).await? else {
            return Ok(None);
        };
        match raw.parse::<Theme>() {
            Ok(theme) => Ok(Some(theme)),
            Err(e) => {
                log::warn!("Ignoring stored theme: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), anyhow::Error> {
        log::info!("Saving theme: {}", theme);
        self.set_item(THEME_KEY, theme.as_str()).await
    }

    // --- Onboarding ---

    /// `false` unless the flag was explicitly stored as `true`.
    pub async fn get_onboarding_completed(&self) -> Result<bool, anyhow::Error> {
        Ok(self.get_json::<bool>(ONBOARDING_COMPLETED_KEY).await?.unwrap_or(false))
    }

    pub async fn set_onboarding_completed(&self, completed: bool) -> Result<(), anyhow::Error> {
        log::info!("Saving onboarding completed flag: {}", completed);
        self.set_json(ONBOARDING_COMPLETED_KEY, &completed).await
    }

    // --- User identity ---

    /// Stored uuid; an empty string counts as absent.
    pub async fn get_user_uuid(&self) -> Result<Option<String>, anyhow::Error> {
        Ok(self.get_item(USER_UUID_KEY).await?.filter(|v| !v.is_empty()))
    }

    pub async fn set_user_uuid(&self, uuid: &str) -> Result<(), anyhow::Error> {
        self.set_item(USER_UUID_KEY, uuid).await
    }

    /// Stored display name; an empty string counts as absent.
    pub async fn get_user_name(&self) -> Result<Option<String>, anyhow::Error> {
        Ok(self.get_item(USER_NAME_KEY).await?.filter(|v| !v.is_empty()))
    }

    pub async fn set_user_name(&self, name: &str) -> Result<(), anyhow::Error> {
        self.set_item(USER_NAME_KEY, name).await
    }

    // --- Credit ---

    /// Cached credit balance, `0` when absent or unreadable.
    pub async fn get_user_credit(&self) -> Result<u64, anyhow::Error> {
        let Some(raw) = self.get_item(USER_CREDIT_KEY).await? else {
            return Ok(0);
        };
        match raw.trim().parse::<u64>() {
            Ok(credit) => Ok(credit),
            Err(e) => {
                log::warn!("Ignoring stored credit '{}': {}", raw, e);
                Ok(0)
            }
        }
    }

    pub async fn set_user_credit(&self, credit: u64) -> Result<(), anyhow::Error> {
        log::debug!("Saving credit balance: {}", credit);
        self.set_item(USER_CREDIT_KEY, &credit.to_string()).await
    }

    /// Adds to the cached balance and returns the new total.
    pub async fn add_user_credit(&self, amount: u64) -> Result<u64, anyhow::Error> {
        let total = self.get_user_credit().await?.saturating_add(amount);
        self.set_user_credit(total).await?;
        Ok(total)
    }

    /// Subtracts from the cached balance (floored at zero) and returns the new total.
    pub async fn subtract_user_credit(&self, amount: u64) -> Result<u64, anyhow::Error> {
        let total = self.get_user_credit().await?.saturating_sub(amount);
        self.set_user_credit(total).await?;
        Ok(total)
    }

    // --- Chat ---

    pub async fn get_chat_contacts(&self) -> Result<Vec<ChatContact>, anyhow::Error> {
        self.get_json_list(CHAT_CONTACTS_KEY).await
    }

    pub async fn set_chat_contacts(&self, contacts: &[ChatContact]) -> Result<(), anyhow::Error> {
        log::debug!("Saving {} chat contacts", contacts.len());
        self.set_json(CHAT_CONTACTS_KEY, contacts).await
    }

    pub async fn get_chat_history(&self) -> Result<Vec<ChatHistory>, anyhow::Error> {
        self.get_json_list(CHAT_HISTORY_KEY).await
    }

    pub async fn set_chat_history(&self, histories: &[ChatHistory]) -> Result<(), anyhow::Error> {
        log::debug!("Saving {} chat histories", histories.len());
        self.set_json(CHAT_HISTORY_KEY, histories).await
    }

    /// Drops contacts and histories, leaving identity, credit and theme in place.
    pub async fn clear_chat_data(&self) -> Result<(), anyhow::Error> {
        log::warn!("Clearing chat data from cache");
        self.remove_item(CHAT_CONTACTS_KEY).await?;
        self.remove_item(CHAT_HISTORY_KEY).await
    }
}
