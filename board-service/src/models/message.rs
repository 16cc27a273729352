//! Message board record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Upper bound on message length, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Author clearance when the message was posted; never refreshed.
    pub clearance_level: String,
}

impl Message {
    pub fn new(user_id: &str, username: &str, content: String, clearance_level: &str) -> Self {
        Self {
            message_id: format!("msg-{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            username: username.to_string(),
            content,
            timestamp: Utc::now(),
            clearance_level: clearance_level.to_string(),
        }
    }
}

/// One page of messages, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Id to pass as `lastKey` for the next page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_key: Option<String>,
}
