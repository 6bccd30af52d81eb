use crate::config::AppConfig;
use crate::models::{AddCreditRequest, ChatReply, ChatRequest, CreateUserRequest, UserInfo};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// --- User-facing failure messages (the app ships in Turkish) ---

pub const NETWORK_ERROR_MESSAGE: &str = "Ağ bağlantısı hatası";
pub const CREATE_USER_FAILED_MESSAGE: &str = "Kullanıcı oluşturulamadı";
pub const CREATE_USER_RAW_SUCCESS_MESSAGE: &str = "Kullanıcı başarıyla oluşturuldu";
pub const ADD_CREDIT_FAILED_MESSAGE: &str = "Kredi eklenemedi";
pub const ADD_CREDIT_RAW_SUCCESS_MESSAGE: &str = "Kredi başarıyla eklendi";
pub const USER_INFO_FAILED_MESSAGE: &str = "Kullanıcı bilgisi alınamadı";
pub const USER_INFO_FORMAT_MESSAGE: &str = "Kullanıcı bilgisi formatı hatalı";
pub const CHAT_FAILED_MESSAGE: &str = "Mesaj gönderilemedi";
pub const CHAT_FORMAT_MESSAGE: &str = "Chat response formatı hatalı";

// How much of an unparseable error body is echoed back
const RAW_ERROR_PREVIEW_CHARS: usize = 100;

/// Outcome of a backend call. Transport and protocol failures are folded into `Failure`.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResponse<T> {
    Success(T),
    Failure { message: String },
}

impl<T> ApiResponse<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse::Failure { message: message.into() }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            ApiResponse::Success(value) => Ok(value),
            ApiResponse::Failure { message } => Err(anyhow::anyhow!(message)),
        }
    }
}

/// Payload of write endpoints (user creation, credit top-up).
#[derive(Clone, Debug, PartialEq)]
pub enum Acknowledgement {
    /// The backend answered with JSON; its `data` (or the whole body when absent).
    Parsed(serde_json::Value),
    /// The backend answered 2xx with a body that was not JSON.
    Raw { message: String, raw_response: String },
}

// Trait defining the backend operations the client relies on
#[async_trait]
pub trait CompanionApiProvider: Send + Sync {
    async fn create_user(&self, request: &CreateUserRequest) -> ApiResponse<Acknowledgement>;

    async fn add_credit(&self, uuid: &str, coin: u64) -> ApiResponse<Acknowledgement>;

    async fn get_user_info(&self, uuid: &str) -> ApiResponse<UserInfo>;

    async fn send_chat_message(&self, request: &ChatRequest) -> ApiResponse<ChatReply>;
}

// Common `{success, message, data}` wrapper used by every endpoint
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

fn default_success() -> bool {
    true
}

#[derive(Deserialize, Debug)]
struct ChatData {
    #[serde(default)]
    conversation_id: Option<serde_json::Value>,
    #[serde(default)]
    tokens_used: u64,
    #[serde(default)]
    response_time: f64,
    remaining_coins: u64,
    #[serde(default)]
    model: String,
}

// Raw HTTP exchange: status plus the body read as text
struct RawResponse {
    status: StatusCode,
    body: String,
}

// --- reqwest implementation ---

pub struct HttpApiProvider {
    client: Client,
    config: AppConfig,
}

impl HttpApiProvider {
    pub fn new(config: AppConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    /// Sends the request and reads the body as text; `None` means the exchange itself failed.
    async fn execute(&self, request: reqwest::RequestBuilder, what: &str) -> Option<RawResponse> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("{} request failed: {:?}", what, e);
                return None;
            }
        };

        let status = response.status();
        log::info!("{} response status: {}", what, status);
        match response.text().await {
            Ok(body) => {
                log::debug!("{} response body: {}", what, body);
                Some(RawResponse { status, body })
            }
            Err(e) => {
                log::error!("{} failed to read response body: {:?}", what, e);
                None
            }
        }
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B, what: &str) -> Option<RawResponse> {
        let url = self.config.endpoint(path);
        log::info!("Calling backend: POST {}", url);
        self.execute(self.client.post(&url).json(body), what).await
    }
}

#[async_trait]
impl CompanionApiProvider for HttpApiProvider {
    async fn create_user(&self, request: &CreateUserRequest) -> ApiResponse<Acknowledgement> {
        let Some(raw) = self.post_json("users", request, "create_user").await else {
            return ApiResponse::failure(NETWORK_ERROR_MESSAGE);
        };
        // Registration trusts the status line alone; a 2xx body is passed through whatever it says
        parse_acknowledgement(raw, CREATE_USER_RAW_SUCCESS_MESSAGE, CREATE_USER_FAILED_MESSAGE, false)
    }

    async fn add_credit(&self, uuid: &str, coin: u64) -> ApiResponse<Acknowledgement> {
        let body = AddCreditRequest {
            uuid: uuid.to_string(),
            coin,
        };
        let Some(raw) = self.post_json("users/credit", &body, "add_credit").await else {
            return ApiResponse::failure(NETWORK_ERROR_MESSAGE);
        };
        parse_acknowledgement(raw, ADD_CREDIT_RAW_SUCCESS_MESSAGE, ADD_CREDIT_FAILED_MESSAGE, true)
    }

    async fn get_user_info(&self, uuid: &str) -> ApiResponse<UserInfo> {
        let url = self.config.endpoint(&format!("users/{}", uuid));
        log::info!("Calling backend: GET {}", url);
        let Some(raw) = self.execute(self.client.get(&url), "get_user_info").await else {
            return ApiResponse::failure(NETWORK_ERROR_MESSAGE);
        };
        parse_strict::<UserInfo>(raw, USER_INFO_FORMAT_MESSAGE, USER_INFO_FAILED_MESSAGE)
            .map_success(|(_, data)| data)
    }

    async fn send_chat_message(&self, request: &ChatRequest) -> ApiResponse<ChatReply> {
        let Some(raw) = self.post_json("chat", request, "send_chat_message").await else {
            return ApiResponse::failure(NETWORK_ERROR_MESSAGE);
        };
        parse_strict::<ChatData>(raw, CHAT_FORMAT_MESSAGE, CHAT_FAILED_MESSAGE).map_success(|(message, data)| {
            ChatReply {
                reply: message.unwrap_or_default(),
                conversation_id: match data.conversation_id {
                    Some(serde_json::Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
                tokens_used: data.tokens_used,
                response_time: data.response_time,
                remaining_coins: data.remaining_coins,
                model: data.model,
            }
        })
    }
}

impl<T> ApiResponse<T> {
    fn map_success<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        match self {
            ApiResponse::Success(value) => ApiResponse::Success(f(value)),
            ApiResponse::Failure { message } => ApiResponse::Failure { message },
        }
    }
}

// --- Body parsing ---

/// Lenient policy: a 2xx answer counts as success even when the body is not JSON.
/// With `honour_success_flag`, a 2xx JSON body carrying `success:false` is still a failure.
fn parse_acknowledgement(
    raw: RawResponse,
    raw_success_message: &str,
    failure_default: &str,
    honour_success_flag: bool,
) -> ApiResponse<Acknowledgement> {
    if !raw.status.is_success() {
        return failure_from_error_body(&raw.body, failure_default);
    }

    match serde_json::from_str::<serde_json::Value>(&raw.body) {
        Ok(json) => {
            if honour_success_flag && json.get("success").and_then(|v| v.as_bool()) == Some(false) {
                return ApiResponse::failure(json_message(&json).unwrap_or(failure_default));
            }
            let data = match json.get("data") {
                Some(data) => data.clone(),
                None => json,
            };
            ApiResponse::Success(Acknowledgement::Parsed(data))
        }
        Err(e) => {
            log::warn!("Response was successful but not JSON, treating as success: {}", e);
            ApiResponse::Success(Acknowledgement::Raw {
                message: raw_success_message.to_string(),
                raw_response: raw.body,
            })
        }
    }
}

/// Strict policy: a 2xx answer must carry a well-formed envelope with `data`.
/// Yields the envelope message alongside the decoded data.
fn parse_strict<T: DeserializeOwned>(raw: RawResponse, format_message: &str, failure_default: &str) -> ApiResponse<(Option<String>, T)> {
    if !raw.status.is_success() {
        return failure_from_error_body(&raw.body, failure_default);
    }

    let envelope: Envelope<T> = match serde_json::from_str(&raw.body) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::error!("Malformed response body: {}", e);
            return ApiResponse::failure(format_message);
        }
    };

    if !envelope.success {
        return ApiResponse::failure(envelope.message.unwrap_or_else(|| failure_default.to_string()));
    }
    match envelope.data {
        Some(data) => ApiResponse::Success((envelope.message, data)),
        None => {
            log::error!("Response envelope carried no data");
            ApiResponse::failure(format_message)
        }
    }
}

fn failure_from_error_body<T>(body: &str, failure_default: &str) -> ApiResponse<T> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => ApiResponse::failure(json_message(&json).unwrap_or(failure_default)),
        Err(_) => {
            let preview: String = body.chars().take(RAW_ERROR_PREVIEW_CHARS).collect();
            ApiResponse::failure(format!("Server hatası: {}...", preview))
        }
    }
}

fn json_message(json: &serde_json::Value) -> Option<&str> {
    json.get("message").and_then(|m| m.as_str()).filter(|m| !m.is_empty())
}
