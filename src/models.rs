use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Shown as the contact preview when the last message is a picture
pub const IMAGE_PREVIEW_TEXT: &str = "📸 Resim";

// Represents a single chat message. Field names follow the JSON the mobile app persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub is_user: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_image_only: bool,
}

impl Message {
    /// A message typed by the user, stamped now.
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
            image: None,
            is_image_only: false,
        }
    }

    /// A reply authored by the companion, stamped now.
    pub fn from_companion(text: impl Into<String>) -> Self {
        Self {
            is_user: false,
            ..Self::from_user(text)
        }
    }

    /// A companion reply consisting only of a picture.
    pub fn image_only(image: impl Into<ImageRef>) -> Self {
        Self {
            image: Some(image.into()),
            is_image_only: true,
            ..Self::from_companion(String::new())
        }
    }

    /// Text used for the contact list preview.
    pub fn preview_text(&self) -> String {
        if self.is_image_only {
            IMAGE_PREVIEW_TEXT.to_string()
        } else {
            self.text.clone()
        }
    }
}

/// Picture attached to a message. The mobile app stored bundled assets as the numeric
/// handle React Native's `require` returns, and remote pictures as a URI string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ImageRef {
    Asset(u64),
    Uri(String),
}

impl From<&str> for ImageRef {
    fn from(uri: &str) -> Self {
        ImageRef::Uri(uri.to_string())
    }
}

impl From<String> for ImageRef {
    fn from(uri: String) -> Self {
        ImageRef::Uri(uri)
    }
}

// A chat participant (AI persona) with its list preview
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatContact {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ChatContact {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            last_message: None,
            last_message_time: None,
            unread_count: 0,
        }
    }
}

/// Partial update for a contact; `Some` fields overwrite, `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub unread_count: Option<u32>,
}

// Ordered messages exchanged with one contact
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub contact_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            messages: Vec::new(),
        }
    }
}

// --- Theme ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(anyhow::anyhow!("Unknown theme: {}", other)),
        }
    }
}

// --- Backend wire types ---

// Body of POST /users
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CreateUserRequest {
    pub uuid: String,
    pub name: String,
    pub project_id: u32,
}

// Body of POST /users/credit
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AddCreditRequest {
    pub uuid: String,
    pub coin: u64,
}

// Body of POST /chat. The backend expects project_id as a string here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub uuid: String,
    pub project_id: String,
}

// `data` of GET /users/{uuid}
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserInfo {
    pub uuid: String,
    pub name: String,
    pub coin: u64,
    #[serde(default)]
    pub project_id: Option<u32>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Successful chat exchange: the companion's reply plus the accounting the backend returns.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub conversation_id: String,
    pub tokens_used: u64,
    pub response_time: f64,
    pub remaining_coins: u64,
    pub model: String,
}

/// Identity of the local user as persisted in the cache.
#[derive(Clone, Debug, PartialEq)]
pub struct UserIdentity {
    pub uuid: String,
    pub name: Option<String>,
    pub is_new: bool,
}

// --- Companion catalog ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AiCharacter {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub avatar: &'static str,
}

impl AiCharacter {
    /// Fresh contact entry for this character.
    pub fn to_contact(&self) -> ChatContact {
        ChatContact {
            avatar: Some(self.avatar.to_string()),
            ..ChatContact::new(self.id, self.name)
        }
    }
}

pub const AI_CHARACTERS: &[AiCharacter] = &[
    AiCharacter {
        id: "5",
        name: "Teknasyon",
        description: "Teknoloji uzmanı ile konuş",
        avatar: "teknasyon.png",
    },
    AiCharacter {
        id: "8",
        name: "Jon Snow",
        description: "Kuzey'in Kralı ile konuş",
        avatar: "jonsnow.png",
    },
    AiCharacter {
        id: "10",
        name: "Cersei Lannister",
        description: "Kraliçe ile sohbet et",
        avatar: "cersei.png",
    },
    AiCharacter {
        id: "9",
        name: "Night King",
        description: "Gece Kralı'nın gücü",
        avatar: "nightking.png",
    },
    AiCharacter {
        id: "11",
        name: "Semih Kışlar",
        description: "Hackathon düşmanı danışman ile konuş",
        avatar: "semih.jpg",
    },
    AiCharacter {
        id: "12",
        name: "Doruk",
        description: "Kuşadalı DJ, Sallantılı Developer ile konuş",
        avatar: "doruk.jpg",
    },
];

pub fn find_character(id: &str) -> Option<&'static AiCharacter> {
    AI_CHARACTERS.iter().find(|c| c.id == id)
}
