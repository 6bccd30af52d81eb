use crate::models::{ChatContact, ChatHistory, ContactUpdate, Message};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    pub contacts: Vec<ChatContact>,
    pub chat_histories: Vec<ChatHistory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_contact_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatAction {
    /// Marks a contact as open and zeroes its unread counter.
    SetActiveContact(String),
    AddMessage { contact_id: String, message: Message },
    /// Ignored when a contact with the same id already exists.
    AddContact(ChatContact),
    UpdateContact { id: String, updates: ContactUpdate },
    ClearChatHistory(String),
    /// Replaces contacts and histories wholesale.
    LoadChatHistory {
        contacts: Vec<ChatContact>,
        chat_histories: Vec<ChatHistory>,
    },
}

impl ChatState {
    pub fn apply(&mut self, action: ChatAction) {
        match action {
            ChatAction::SetActiveContact(id) => {
                if let Some(contact) = self.contact_mut(&id) {
                    contact.unread_count = 0;
                }
                self.active_contact_id = Some(id);
            }
            ChatAction::AddMessage { contact_id, message } => self.add_message(contact_id, message),
            ChatAction::AddContact(contact) => {
                if self.contact(&contact.id).is_none() {
                    self.contacts.push(contact);
                }
            }
            ChatAction::UpdateContact { id, updates } => {
                if let Some(contact) = self.contact_mut(&id) {
                    merge_contact(contact, updates);
                }
            }
            ChatAction::ClearChatHistory(contact_id) => {
                if let Some(history) = self.chat_histories.iter_mut().find(|h| h.contact_id == contact_id) {
                    history.messages.clear();
                }
                if let Some(contact) = self.contact_mut(&contact_id) {
                    contact.last_message = None;
                    contact.last_message_time = None;
                    contact.unread_count = 0;
                }
            }
            ChatAction::LoadChatHistory { contacts, chat_histories } => {
                self.contacts = contacts;
                self.chat_histories = chat_histories;
            }
        }
    }

    fn add_message(&mut self, contact_id: String, message: Message) {
        let is_active = self.active_contact_id.as_deref() == Some(contact_id.as_str());

        if let Some(contact) = self.contact_mut(&contact_id) {
            contact.last_message = Some(message.preview_text());
            contact.last_message_time = Some(message.timestamp);
            if !is_active && !message.is_user {
                contact.unread_count += 1;
            }
        }

        match self.chat_histories.iter_mut().find(|h| h.contact_id == contact_id) {
            Some(history) => history.messages.push(message),
            None => self.chat_histories.push(ChatHistory {
                contact_id,
                messages: vec![message],
            }),
        }
    }

    pub fn contact(&self, id: &str) -> Option<&ChatContact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    fn contact_mut(&mut self, id: &str) -> Option<&mut ChatContact> {
        self.contacts.iter_mut().find(|c| c.id == id)
    }

    /// Messages exchanged with `contact_id`, oldest first.
    pub fn messages(&self, contact_id: &str) -> &[Message] {
        self.chat_histories
            .iter()
            .find(|h| h.contact_id == contact_id)
            .map(|h| h.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_unread(&self) -> u32 {
        self.contacts.iter().map(|c| c.unread_count).sum()
    }
}

fn merge_contact(contact: &mut ChatContact, updates: ContactUpdate) {
    if let Some(name) = updates.name {
        contact.name = name;
    }
    if let Some(avatar) = updates.avatar {
        contact.avatar = Some(avatar);
    }
    if let Some(last_message) = updates.last_message {
        contact.last_message = Some(last_message);
    }
    if let Some(time) = updates.last_message_time {
        contact.last_message_time = Some(time);
    }
    if let Some(unread) = updates.unread_count {
        contact.unread_count = unread;
    }
}
