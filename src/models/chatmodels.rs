// models/chatmodels.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    #[serde(alias = "senderId")]
    pub sender_id: String,
    #[serde(default, alias = "senderName")]
    pub sender_name: String,
    pub message: String,
    pub room: String,
    #[serde(default, alias = "messageType")]
    pub message_type: MessageType,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomParticipant {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(default, alias = "userName")]
    pub user_name: String,
}
