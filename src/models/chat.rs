// src/models/chat.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'conversations' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: i64,
    pub is_group: bool,
    pub participants: Vec<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }
}

/// A message joined with its sender's username.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for opening (or reopening) a direct conversation.
#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub participant_id: i64,
}

/// DTO for sending a message.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message length must be between 1 and 4000 chars"))]
    pub content: String,
}

/// Payload of a `typing` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypingStatus {
    pub user_id: i64,
    pub is_typing: bool,
}

/// Payload of a `messageRead` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadReceipt {
    pub user_id: i64,
    pub message_id: i64,
}

/// Envelope pushed to realtime subscribers of a conversation, e.g.
/// `{"event": "newMessage", "payload": {..message..}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ChatEvent {
    NewMessage(Message),
    Typing(TypingStatus),
    MessageRead(ReadReceipt),
    /// Sent only to the socket whose frame was rejected.
    Error { message: String },
}

impl ChatEvent {
    pub fn new_message(message: Message) -> Self {
        ChatEvent::NewMessage(message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ChatEvent::Error {
            message: message.into(),
        }
    }
}

/// Frames a client may send over the conversation socket.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ClientEvent {
    SendMessage { content: String },
    Typing { is_typing: bool },
    ReadReceipt { message_id: i64 },
}
