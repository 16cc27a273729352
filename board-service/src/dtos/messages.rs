use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::Message;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListMessagesQuery {
    /// Page size, 1 to 100 (default 50).
    #[param(example = "50")]
    pub limit: Option<String>,
    /// `lastKey` from the previous page.
    pub last_key: Option<String>,
}

impl ListMessagesQuery {
    pub fn page_size(&self) -> usize {
        // Unparseable values fall back to the default.
        match self.limit.as_deref().map(|l| l.trim().parse::<i64>()) {
            Some(Ok(limit)) => limit.clamp(1, MAX_PAGE_SIZE as i64) as usize,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        self.last_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PostMessageRequest {
    #[schema(example = "Moo from the north field")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostMessageResponse {
    pub success: bool,
    pub message: Message,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    pub success: bool,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_key: Option<String>,
}
