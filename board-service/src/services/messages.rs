use std::sync::Arc;

use crate::{
    models::{Message, MessagePage, MAX_CONTENT_CHARS},
    services::{AuthorizationPolicy, Identity, MessageStore, ServiceError},
};

#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageStore>,
}

/// Trim and bound-check message content.
pub fn validate_content(content: Option<&str>) -> Result<String, ServiceError> {
    let content = content.map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(ServiceError::MissingContent);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ServiceError::ContentTooLong(MAX_CONTENT_CHARS));
    }
    Ok(content.to_string())
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self { messages }
    }

    /// Post as `author`. The message carries the clearance from the session
    /// token, not the live record.
    pub async fn post(
        &self,
        author: &Identity,
        content: Option<&str>,
    ) -> Result<Message, ServiceError> {
        let content = validate_content(content)?;

        let message = Message::new(
            &author.user.user_id,
            &author.user.username,
            content,
            &author.claims.clearance_level,
        );
        self.messages.insert(&message).await?;

        tracing::info!(
            message_id = %message.message_id,
            user_id = %author.user.user_id,
            "Message posted"
        );
        metrics::counter!("board_messages_posted_total").increment(1);
        Ok(message)
    }

    pub async fn list(
        &self,
        limit: usize,
        last_key: Option<&str>,
    ) -> Result<MessagePage, ServiceError> {
        Ok(self.messages.list(limit, last_key).await?)
    }

    /// Delete if the caller owns the message or holds elevated clearance.
    pub async fn delete(&self, caller: &Identity, message_id: &str) -> Result<(), ServiceError> {
        let message = self
            .messages
            .get(message_id)
            .await?
            .ok_or(ServiceError::MessageNotFound)?;

        if !AuthorizationPolicy::can_delete(&caller.user, &message) {
            tracing::info!(
                message_id = %message_id,
                user_id = %caller.user.user_id,
                "Delete refused"
            );
            return Err(ServiceError::Forbidden);
        }

        // Someone else may have deleted it between the read and this write.
        if !self.messages.delete(message_id).await? {
            return Err(ServiceError::MessageNotFound);
        }

        tracing::info!(
            message_id = %message_id,
            user_id = %caller.user.user_id,
            "Message deleted"
        );
        Ok(())
    }
}
