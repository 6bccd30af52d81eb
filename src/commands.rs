// Operations the UI layer calls. Each one sequences cache, store and backend explicitly.

use crate::api::ApiResponse;
use crate::models::{find_character, ChatContact, ChatReply, ChatRequest, CreateUserRequest, Message, Theme, UserIdentity, UserInfo};
use crate::state::AppState;
use crate::store::{ChatAction, CreditAction};
use anyhow::{bail, Context, Result};
use uuid::Uuid;

// Theme used when nothing valid is stored
pub const DEFAULT_THEME: Theme = Theme::Dark;

/// First screen to show after launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitialRoute {
    Onboarding,
    MainTabs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LaunchOutcome {
    pub route: InitialRoute,
    /// Profile fetched from the backend, when the refresh succeeded.
    pub remote_profile: Option<UserInfo>,
}

/// Whether a credit change should also be pushed to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteSync {
    Skip,
    Push,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RemoteCreditStatus {
    Skipped,
    Confirmed,
    /// The local change stands; the backend did not record it.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreditUpdate {
    pub balance: u64,
    pub remote: RemoteCreditStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    Replied {
        user_message: Message,
        reply_message: Message,
        reply: ChatReply,
    },
    /// The user message was recorded but the backend exchange failed.
    Failed { user_message: Message, message: String },
}

// --- Launch ---

/// Hydrates the store from the cache and, for onboarded users, refreshes the profile from the backend.
pub async fn bootstrap(state: &AppState) -> LaunchOutcome {
    log::info!("Bootstrapping application state");

    let onboarding_completed = match load_local_state(state).await {
        Ok(completed) => completed,
        Err(e) => {
            log::error!("Failed to load local state, starting onboarding: {:?}", e);
            return LaunchOutcome {
                route: InitialRoute::Onboarding,
                remote_profile: None,
            };
        }
    };

    if !onboarding_completed {
        log::info!("Onboarding not completed, routing to onboarding");
        return LaunchOutcome {
            route: InitialRoute::Onboarding,
            remote_profile: None,
        };
    }

    let remote_profile = match refresh_user_info(state).await {
        Ok(profile) => profile,
        Err(e) => {
            log::error!("Failed to apply remote profile: {:?}", e);
            None
        }
    };

    LaunchOutcome {
        route: InitialRoute::MainTabs,
        remote_profile,
    }
}

// Reads the onboarding flag, chat data and credit together and loads them into the store.
async fn load_local_state(state: &AppState) -> Result<bool> {
    let (onboarding, contacts, histories, credit) = {
        let storage = state.storage.lock().await;
        tokio::join!(
            storage.get_onboarding_completed(),
            storage.get_chat_contacts(),
            storage.get_chat_history(),
            storage.get_user_credit(),
        )
    };

    let onboarding = onboarding?;
    let contacts = contacts?;
    let chat_histories = histories?;
    let credit = credit?;

    log::info!(
        "Loaded {} contacts, {} histories and credit {} from cache",
        contacts.len(),
        chat_histories.len(),
        credit
    );
    state.store.dispatch(ChatAction::LoadChatHistory { contacts, chat_histories });
    state.store.dispatch(CreditAction::Set(credit));
    Ok(onboarding)
}

/// Fetches the profile by uuid and, on success, overwrites the cached name and credit with it.
/// Backend failures are logged and leave local values untouched.
pub async fn refresh_user_info(state: &AppState) -> Result<Option<UserInfo>> {
    let uuid = state.storage.lock().await.get_user_uuid().await?;
    let Some(uuid) = uuid else {
        log::warn!("No user uuid stored, skipping profile refresh");
        return Ok(None);
    };

    let info = match state.api_provider.get_user_info(&uuid).await {
        ApiResponse::Success(info) => info,
        ApiResponse::Failure { message } => {
            log::warn!("Profile refresh failed, keeping cached values: {}", message);
            return Ok(None);
        }
    };

    {
        let storage = state.storage.lock().await;
        if !info.name.is_empty() {
            storage.set_user_name(&info.name).await?;
        }
        storage.set_user_credit(info.coin).await?;
    }
    state.store.dispatch(CreditAction::Set(info.coin));
    log::info!("Applied remote profile for {}: credit {}", uuid, info.coin);
    Ok(Some(info))
}

// --- Identity & onboarding ---

/// Returns the stored identity, creating the uuid on first use, and registers the user
/// with the backend when a name is known. Registration failures are only logged.
pub async fn initialize_user(state: &AppState) -> Result<UserIdentity> {
    let (uuid, name, is_new) = {
        let storage = state.storage.lock().await;
        let (uuid, is_new) = match storage.get_user_uuid().await? {
            Some(uuid) => {
                log::info!("Found existing user uuid: {}", uuid);
                (uuid, false)
            }
            None => {
                let uuid = Uuid::new_v4().to_string();
                storage.set_user_uuid(&uuid).await.context("Failed to persist new user uuid")?;
                log::info!("Created new user uuid: {}", uuid);
                (uuid, true)
            }
        };
        (uuid, storage.get_user_name().await?, is_new)
    };

    match &name {
        Some(name) => {
            let request = CreateUserRequest {
                uuid: uuid.clone(),
                name: name.clone(),
                project_id: state.config.project_id,
            };
            match state.api_provider.create_user(&request).await {
                ApiResponse::Success(ack) => log::info!("User registered with backend: {:?}", ack),
                ApiResponse::Failure { message } => log::error!("User registration failed: {}", message),
            }
        }
        None => log::info!("No user name stored yet, skipping backend registration"),
    }

    Ok(UserIdentity { uuid, name, is_new })
}

pub async fn save_user_name(state: &AppState, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Name cannot be empty.");
    }
    state.storage.lock().await.set_user_name(name).await?;
    log::info!("Saved user name: {}", name);
    Ok(name.to_string())
}

pub async fn is_onboarding_completed(state: &AppState) -> Result<bool> {
    state.storage.lock().await.get_onboarding_completed().await
}

pub async fn complete_onboarding(state: &AppState) -> Result<()> {
    state.storage.lock().await.set_onboarding_completed(true).await
}

// --- Credit ---

/// Loads the cached balance into the store.
pub async fn load_credit(state: &AppState) -> Result<u64> {
    let credit = state.storage.lock().await.get_user_credit().await?;
    state.store.dispatch(CreditAction::Set(credit));
    Ok(credit)
}

pub async fn set_credit(state: &AppState, credit: u64) -> Result<()> {
    state.storage.lock().await.set_user_credit(credit).await?;
    state.store.dispatch(CreditAction::Set(credit));
    log::info!("Credit set to {}", credit);
    Ok(())
}

/// Adds credit locally (cache first, then store) and optionally pushes the top-up to the backend.
/// A backend failure does not roll back the local increment.
pub async fn add_credit(state: &AppState, amount: u64, sync: RemoteSync) -> Result<CreditUpdate> {
    let (balance, uuid) = {
        let storage = state.storage.lock().await;
        let balance = storage.add_user_credit(amount).await?;
        (balance, storage.get_user_uuid().await?)
    };
    state.store.dispatch(CreditAction::Set(balance));
    log::info!("Added {} credit, new balance {}", amount, balance);

    let remote = match (sync, uuid) {
        (RemoteSync::Skip, _) => RemoteCreditStatus::Skipped,
        (RemoteSync::Push, None) => {
            log::warn!("No user uuid stored, credit top-up not pushed to backend");
            RemoteCreditStatus::Failed("No user uuid stored".to_string())
        }
        (RemoteSync::Push, Some(uuid)) => match state.api_provider.add_credit(&uuid, amount).await {
            ApiResponse::Success(_) => RemoteCreditStatus::Confirmed,
            ApiResponse::Failure { message } => {
                log::warn!("Backend credit top-up failed, local balance {} kept: {}", balance, message);
                RemoteCreditStatus::Failed(message)
            }
        },
    };

    Ok(CreditUpdate { balance, remote })
}

/// Subtracts credit locally, floored at zero. Returns the new balance.
pub async fn subtract_credit(state: &AppState, amount: u64) -> Result<u64> {
    let balance = state.storage.lock().await.subtract_user_credit(amount).await?;
    state.store.dispatch(CreditAction::Set(balance));
    log::info!("Subtracted {} credit, remaining {}", amount, balance);
    Ok(balance)
}

// --- Chat ---

/// Writes the store's contacts and histories to the cache.
pub async fn persist_chat(state: &AppState) -> Result<()> {
    let chat = state.store.chat();
    let storage = state.storage.lock().await;
    storage.set_chat_contacts(&chat.contacts).await?;
    storage.set_chat_history(&chat.chat_histories).await
}

/// Adds the catalog character as a contact (if new) and opens its conversation.
pub async fn start_chat(state: &AppState, character_id: &str) -> Result<ChatContact> {
    let Some(character) = find_character(character_id) else {
        bail!("Unknown character: {}", character_id);
    };
    log::info!("Starting chat with {}", character.name);
    state.store.dispatch(ChatAction::AddContact(character.to_contact()));
    open_chat(state, character_id).await?;

    state
        .store
        .chat()
        .contact(character_id)
        .cloned()
        .context("Contact missing after being added")
}

pub async fn open_chat(state: &AppState, contact_id: &str) -> Result<()> {
    state.store.dispatch(ChatAction::SetActiveContact(contact_id.to_string()));
    persist_chat(state).await
}

/// Records the user's message, asks the backend for a reply and records that too.
/// The remaining balance reported by the backend replaces the local credit.
pub async fn send_message(state: &AppState, contact_id: &str, text: &str) -> Result<SendOutcome> {
    let text = text.trim();
    if text.is_empty() {
        bail!("Message cannot be empty.");
    }

    let uuid = state
        .storage
        .lock()
        .await
        .get_user_uuid()
        .await?
        .context("No user uuid stored; initialize the user first")?;

    let user_message = Message::from_user(text);
    state.store.dispatch(ChatAction::AddMessage {
        contact_id: contact_id.to_string(),
        message: user_message.clone(),
    });
    persist_chat(state).await?;

    let request = ChatRequest {
        message: text.to_string(),
        uuid,
        project_id: state.config.project_id.to_string(),
    };

    let reply = match state.api_provider.send_chat_message(&request).await {
        ApiResponse::Success(reply) => reply,
        ApiResponse::Failure { message } => {
            log::warn!("Chat exchange with {} failed: {}", contact_id, message);
            return Ok(SendOutcome::Failed { user_message, message });
        }
    };

    let reply_message = Message::from_companion(reply.reply.clone());
    state.store.dispatch(ChatAction::AddMessage {
        contact_id: contact_id.to_string(),
        message: reply_message.clone(),
    });
    persist_chat(state).await?;
    state.storage.lock().await.set_user_credit(reply.remaining_coins).await?;
    state.store.dispatch(CreditAction::Set(reply.remaining_coins));

    log::info!(
        "Chat reply from {} ({} tokens, model {}), remaining coins {}",
        contact_id,
        reply.tokens_used,
        reply.model,
        reply.remaining_coins
    );
    Ok(SendOutcome::Replied {
        user_message,
        reply_message,
        reply,
    })
}

pub async fn clear_chat(state: &AppState, contact_id: &str) -> Result<()> {
    log::warn!("Clearing chat history for {}", contact_id);
    state.store.dispatch(ChatAction::ClearChatHistory(contact_id.to_string()));
    persist_chat(state).await
}

// --- Theme ---

/// Stored theme, or the default when absent or unreadable.
pub async fn load_theme(state: &AppState) -> Theme {
    match state.storage.lock().await.get_theme().await {
        Ok(Some(theme)) => theme,
        Ok(None) => DEFAULT_THEME,
        Err(e) => {
            log::error!("Failed to load theme: {:?}", e);
            DEFAULT_THEME
        }
    }
}

pub async fn set_theme(state: &AppState, theme: Theme) -> Result<()> {
    state.storage.lock().await.set_theme(theme).await
}

// --- Account ---

/// Drops chat data from cache and store; identity and credit survive.
pub async fn logout(state: &AppState) -> Result<()> {
    log::warn!("Logging out: clearing chat data");
    state.storage.lock().await.clear_chat_data().await?;
    state.store.dispatch(ChatAction::LoadChatHistory {
        contacts: Vec::new(),
        chat_histories: Vec::new(),
    });
    Ok(())
}

/// Wipes every cached key and resets the store.
pub async fn delete_account(state: &AppState) -> Result<()> {
    log::warn!("Deleting account: clearing all local data");
    state.storage.lock().await.clear_all().await?;
    state.store.dispatch(ChatAction::LoadChatHistory {
        contacts: Vec::new(),
        chat_histories: Vec::new(),
    });
    state.store.dispatch(CreditAction::Reset);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Acknowledgement, CompanionApiProvider, CHAT_FORMAT_MESSAGE, NETWORK_ERROR_MESSAGE};
    use crate::config::AppConfig;
    use crate::models::ChatHistory;
    use crate::storage::StorageManager;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use tempfile::TempDir;

    // In-process backend with a remote balance that only moves on successful calls
    struct FakeApi {
        remote_coin: StdMutex<u64>,
        fail_credit: bool,
        fail_profile: bool,
        chat_reply: Option<ChatReply>,
        calls: StdMutex<Vec<String>>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                remote_coin: StdMutex::new(0),
                fail_credit: false,
                fail_profile: false,
                chat_reply: None,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl CompanionApiProvider for FakeApi {
        async fn create_user(&self, request: &CreateUserRequest) -> ApiResponse<Acknowledgement> {
            self.record(format!("create_user:{}:{}", request.name, request.project_id));
            ApiResponse::Success(Acknowledgement::Parsed(serde_json::json!({"uuid": request.uuid})))
        }

        async fn add_credit(&self, _uuid: &str, coin: u64) -> ApiResponse<Acknowledgement> {
            self.record(format!("add_credit:{}", coin));
            if self.fail_credit {
                return ApiResponse::failure(NETWORK_ERROR_MESSAGE);
            }
            *self.remote_coin.lock().unwrap() += coin;
            ApiResponse::Success(Acknowledgement::Parsed(serde_json::Value::Null))
        }

        async fn get_user_info(&self, uuid: &str) -> ApiResponse<UserInfo> {
            self.record("get_user_info");
            if self.fail_profile {
                return ApiResponse::failure(NETWORK_ERROR_MESSAGE);
            }
            ApiResponse::Success(UserInfo {
                uuid: uuid.to_string(),
                name: "Remote Ada".to_string(),
                coin: *self.remote_coin.lock().unwrap(),
                project_id: Some(5),
                project_name: None,
                created_at: None,
            })
        }

        async fn send_chat_message(&self, request: &ChatRequest) -> ApiResponse<ChatReply> {
            self.record(format!("chat:{}:{}", request.message, request.project_id));
            match &self.chat_reply {
                Some(reply) => ApiResponse::Success(reply.clone()),
                None => ApiResponse::failure(CHAT_FORMAT_MESSAGE),
            }
        }
    }

    async fn test_state(api: FakeApi) -> (AppState, Arc<FakeApi>, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = StorageManager::new(&dir.path().join("cache.sqlite")).await.unwrap();
        let api = Arc::new(api);
        let provider: Arc<dyn CompanionApiProvider> = api.clone();
        (AppState::new(storage, provider, AppConfig::default()), api, dir)
    }

    fn reply(text: &str, remaining: u64) -> ChatReply {
        ChatReply {
            reply: text.to_string(),
            conversation_id: "c-1".to_string(),
            tokens_used: 12,
            response_time: 0.4,
            remaining_coins: remaining,
            model: "gpt-test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fresh_install_routes_to_onboarding() {
        let (state, api, _dir) = test_state(FakeApi::new()).await;

        assert!(!is_onboarding_completed(&state).await.unwrap());
        let outcome = bootstrap(&state).await;

        assert_eq!(outcome.route, InitialRoute::Onboarding);
        assert!(outcome.remote_profile.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_hydrates_store_and_prefers_remote_profile() {
        let api = FakeApi::new();
        *api.remote_coin.lock().unwrap() = 80;
        let (state, _api, _dir) = test_state(api).await;
        {
            let storage = state.storage.lock().await;
            storage.set_onboarding_completed(true).await.unwrap();
            storage.set_user_uuid("u-1").await.unwrap();
            storage.set_user_credit(15).await.unwrap();
            storage.set_chat_contacts(&[ChatContact::new("8", "Jon Snow")]).await.unwrap();
            storage.set_chat_history(&[ChatHistory::new("8")]).await.unwrap();
        }

        let outcome = bootstrap(&state).await;

        assert_eq!(outcome.route, InitialRoute::MainTabs);
        assert_eq!(outcome.remote_profile.unwrap().coin, 80);
        assert_eq!(state.store.credit(), 80);
        assert_eq!(state.store.chat().contacts.len(), 1);
        let storage = state.storage.lock().await;
        assert_eq!(storage.get_user_credit().await.unwrap(), 80);
        assert_eq!(storage.get_user_name().await.unwrap().as_deref(), Some("Remote Ada"));
    }

    #[tokio::test]
    async fn test_bootstrap_keeps_local_values_when_profile_fails() {
        let api = FakeApi {
            fail_profile: true,
            ..FakeApi::new()
        };
        let (state, _api, _dir) = test_state(api).await;
        {
            let storage = state.storage.lock().await;
            storage.set_onboarding_completed(true).await.unwrap();
            storage.set_user_uuid("u-1").await.unwrap();
            storage.set_user_credit(15).await.unwrap();
        }

        let outcome = bootstrap(&state).await;

        assert_eq!(outcome.route, InitialRoute::MainTabs);
        assert!(outcome.remote_profile.is_none());
        assert_eq!(state.store.credit(), 15);
    }

    #[tokio::test]
    async fn test_failed_remote_top_up_leaves_local_and_remote_diverged() {
        let api = FakeApi {
            fail_credit: true,
            ..FakeApi::new()
        };
        let (state, api, _dir) = test_state(api).await;
        state.storage.lock().await.set_user_uuid("u-1").await.unwrap();
        set_credit(&state, 10).await.unwrap();

        let update = add_credit(&state, 50, RemoteSync::Push).await.unwrap();

        assert_eq!(update.balance, 60);
        assert_eq!(update.remote, RemoteCreditStatus::Failed(NETWORK_ERROR_MESSAGE.to_string()));
        assert_eq!(state.store.credit(), 60);
        assert_eq!(state.storage.lock().await.get_user_credit().await.unwrap(), 60);
        assert_eq!(*api.remote_coin.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_top_up_reaches_backend() {
        let (state, api, _dir) = test_state(FakeApi::new()).await;
        state.storage.lock().await.set_user_uuid("u-1").await.unwrap();

        let update = add_credit(&state, 25, RemoteSync::Push).await.unwrap();
        assert_eq!(update.remote, RemoteCreditStatus::Confirmed);
        assert_eq!(*api.remote_coin.lock().unwrap(), 25);

        let local_only = add_credit(&state, 5, RemoteSync::Skip).await.unwrap();
        assert_eq!(local_only.balance, 30);
        assert_eq!(local_only.remote, RemoteCreditStatus::Skipped);
        assert_eq!(api.calls(), vec!["add_credit:25".to_string()]);
    }

    #[tokio::test]
    async fn test_subtract_floors_at_zero_everywhere() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;
        set_credit(&state, 10).await.unwrap();

        assert_eq!(subtract_credit(&state, 4).await.unwrap(), 6);
        assert_eq!(subtract_credit(&state, 40).await.unwrap(), 0);
        assert_eq!(state.store.credit(), 0);
        assert_eq!(load_credit(&state).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_initialize_user_creates_uuid_once_and_registers_named_users() {
        let (state, api, _dir) = test_state(FakeApi::new()).await;

        let first = initialize_user(&state).await.unwrap();
        assert!(first.is_new);
        assert!(first.name.is_none());
        assert!(api.calls().is_empty());

        save_user_name(&state, "  Ada  ").await.unwrap();
        let second = initialize_user(&state).await.unwrap();
        assert!(!second.is_new);
        assert_eq!(second.uuid, first.uuid);
        assert_eq!(second.name.as_deref(), Some("Ada"));
        assert_eq!(api.calls(), vec!["create_user:Ada:5".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;
        assert!(save_user_name(&state, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_send_message_records_reply_and_mirrors_remaining_coins() {
        let api = FakeApi {
            chat_reply: Some(reply("Winter is coming.", 37)),
            ..FakeApi::new()
        };
        let (state, api, _dir) = test_state(api).await;
        initialize_user(&state).await.unwrap();
        set_credit(&state, 40).await.unwrap();
        start_chat(&state, "8").await.unwrap();

        let outcome = send_message(&state, "8", " Who are you? ").await.unwrap();

        let SendOutcome::Replied { user_message, reply_message, .. } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(user_message.text, "Who are you?");
        assert_eq!(reply_message.text, "Winter is coming.");
        assert_eq!(state.store.credit(), 37);
        assert_eq!(api.calls(), vec!["chat:Who are you?:5".to_string()]);

        let chat = state.store.chat();
        assert_eq!(chat.messages("8").len(), 2);
        // The conversation is open, so the reply does not count as unread
        assert_eq!(chat.contact("8").unwrap().unread_count, 0);

        let storage = state.storage.lock().await;
        assert_eq!(storage.get_chat_history().await.unwrap(), chat.chat_histories);
        assert_eq!(storage.get_user_credit().await.unwrap(), 37);
    }

    #[tokio::test]
    async fn test_reply_is_saved_even_when_credit_write_fails() {
        let api = FakeApi {
            chat_reply: Some(reply("Dracarys.", 9)),
            ..FakeApi::new()
        };
        let (state, _api, dir) = test_state(api).await;
        initialize_user(&state).await.unwrap();
        start_chat(&state, "10").await.unwrap();

        // A second connection installs triggers that reject any credit write
        let url = format!("sqlite://{}", dir.path().join("cache.sqlite").to_string_lossy());
        let pool = sqlx::SqlitePool::connect(&url).await.unwrap();
        for event in ["INSERT", "UPDATE"] {
            sqlx::query(&format!(
                "CREATE TRIGGER reject_credit_{event} BEFORE {event} ON key_value_store \
                 WHEN NEW.key = '{key}' BEGIN SELECT RAISE(ABORT, 'credit write rejected'); END",
                event = event,
                key = crate::storage::USER_CREDIT_KEY
            ))
            .execute(&pool)
            .await
            .unwrap();
        }
        pool.close().await;

        assert!(send_message(&state, "10", "Who rules?").await.is_err());

        let cached = state.storage.lock().await.get_chat_history().await.unwrap();
        let texts: Vec<&str> = cached[0].messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Who rules?", "Dracarys."]);
        assert_eq!(state.store.credit(), 0);
    }

    #[tokio::test]
    async fn test_send_message_failure_keeps_user_message() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;
        initialize_user(&state).await.unwrap();
        start_chat(&state, "10").await.unwrap();

        let outcome = send_message(&state, "10", "hello").await.unwrap();

        assert!(matches!(outcome, SendOutcome::Failed { ref message, .. } if message == CHAT_FORMAT_MESSAGE));
        assert_eq!(state.store.chat().messages("10").len(), 1);
        assert_eq!(state.storage.lock().await.get_chat_history().await.unwrap()[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_requires_identity_and_text() {
        let (state, api, _dir) = test_state(FakeApi::new()).await;

        assert!(send_message(&state, "8", "hi").await.is_err());
        initialize_user(&state).await.unwrap();
        assert!(send_message(&state, "8", "   ").await.is_err());
        assert!(state.store.chat().messages("8").is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_chat_is_idempotent_and_rejects_unknown() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;

        start_chat(&state, "12").await.unwrap();
        let contact = start_chat(&state, "12").await.unwrap();

        assert_eq!(contact.name, "Doruk");
        assert_eq!(state.store.chat().contacts.len(), 1);
        assert_eq!(state.store.chat().active_contact_id.as_deref(), Some("12"));
        assert!(start_chat(&state, "404").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_chat_persists_empty_history() {
        let api = FakeApi {
            chat_reply: Some(reply("ok", 0)),
            ..FakeApi::new()
        };
        let (state, _api, _dir) = test_state(api).await;
        initialize_user(&state).await.unwrap();
        start_chat(&state, "5").await.unwrap();
        send_message(&state, "5", "hi").await.unwrap();

        clear_chat(&state, "5").await.unwrap();

        let stored = state.storage.lock().await.get_chat_history().await.unwrap();
        assert!(stored[0].messages.is_empty());
        assert!(state.store.chat().contact("5").unwrap().last_message.is_none());
    }

    #[tokio::test]
    async fn test_histories_from_mobile_app_survive_launch_and_next_save() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;
        {
            let storage = state.storage.lock().await;
            storage
                .set_item(
                    crate::storage::CHAT_CONTACTS_KEY,
                    r#"[{"id":"8","name":"Jon Snow","lastMessage":"Winter","unreadCount":1},{"id":"9","name":"Night King"}]"#,
                )
                .await
                .unwrap();
            storage
                .set_item(
                    crate::storage::CHAT_HISTORY_KEY,
                    r#"[{"contactId":"8","messages":[{"id":"1714557600000","text":"Winter","isUser":false,"timestamp":"2024-05-01T10:00:00.000Z"}]},{"contactId":"9","messages":[{"id":"1714557600001","text":"","isUser":false,"timestamp":"2024-05-01T10:01:00.000Z","image":7,"isImageOnly":true}]}]"#,
                )
                .await
                .unwrap();
            storage.set_onboarding_completed(true).await.unwrap();
        }

        let outcome = bootstrap(&state).await;
        assert_eq!(outcome.route, InitialRoute::MainTabs);
        assert_eq!(state.store.chat().chat_histories.len(), 2);

        clear_chat(&state, "8").await.unwrap();

        let cached = state.storage.lock().await.get_chat_history().await.unwrap();
        assert_eq!(cached.len(), 2);
        assert!(cached[0].messages.is_empty());
        assert_eq!(cached[1].messages[0].image, Some(crate::models::ImageRef::Asset(7)));
    }

    #[tokio::test]
    async fn test_theme_defaults_to_dark() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;
        assert_eq!(load_theme(&state).await, Theme::Dark);
        set_theme(&state, Theme::Light).await.unwrap();
        assert_eq!(load_theme(&state).await, Theme::Light);
    }

    #[tokio::test]
    async fn test_logout_and_delete_account() {
        let (state, _api, _dir) = test_state(FakeApi::new()).await;
        let identity = initialize_user(&state).await.unwrap();
        set_credit(&state, 9).await.unwrap();
        start_chat(&state, "8").await.unwrap();

        logout(&state).await.unwrap();
        assert!(state.store.chat().contacts.is_empty());
        {
            let storage = state.storage.lock().await;
            assert!(storage.get_chat_contacts().await.unwrap().is_empty());
            assert_eq!(storage.get_user_uuid().await.unwrap(), Some(identity.uuid));
            assert_eq!(storage.get_user_credit().await.unwrap(), 9);
        }

        delete_account(&state).await.unwrap();
        assert_eq!(state.store.credit(), 0);
        assert!(state.storage.lock().await.all_keys().await.unwrap().is_empty());
        assert_eq!(bootstrap(&state).await.route, InitialRoute::Onboarding);
    }
}
