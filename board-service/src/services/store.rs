//! Identity and message stores.
//!
//! Every operation touches a single key; nothing here spans keys
//! transactionally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::{Message, MessagePage, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up by email; the key is case-folded by the store.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;

    /// Insert a new record. Returns `false` when the email is already taken.
    async fn insert(&self, user: &User) -> Result<bool, anyhow::Error>;

    /// Blind write of the last-login time.
    async fn record_login(&self, email: &str, at: DateTime<Utc>) -> Result<(), anyhow::Error>;

    /// Used by the approval tooling. Returns `false` when no such user exists.
    async fn set_status(&self, email: &str, status: &str) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &Message) -> Result<(), anyhow::Error>;

    async fn get(&self, message_id: &str) -> Result<Option<Message>, anyhow::Error>;

    /// Returns `false` when the message did not exist.
    async fn delete(&self, message_id: &str) -> Result<bool, anyhow::Error>;

    /// Newest first, starting after `last_key` when given.
    async fn list(
        &self,
        limit: usize,
        last_key: Option<&str>,
    ) -> Result<MessagePage, anyhow::Error>;
}

pub fn user_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-process store backed by concurrent maps.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    messages: DashMap<String, Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a user record wholesale, as seeding or admin tooling would.
    pub fn upsert_user(&self, user: User) {
        self.users.insert(user_key(&user.email), user);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.users.get(&user_key(email)).map(|u| u.clone()))
    }

    async fn insert(&self, user: &User) -> Result<bool, anyhow::Error> {
        match self.users.entry(user_key(&user.email)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(true)
            }
        }
    }

    async fn record_login(&self, email: &str, at: DateTime<Utc>) -> Result<(), anyhow::Error> {
        if let Some(mut user) = self.users.get_mut(&user_key(email)) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn set_status(&self, email: &str, status: &str) -> Result<bool, anyhow::Error> {
        match self.users.get_mut(&user_key(email)) {
            Some(mut user) => {
                user.status = status.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: &Message) -> Result<(), anyhow::Error> {
        self.messages
            .insert(message.message_id.clone(), message.clone());
        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Option<Message>, anyhow::Error> {
        Ok(self.messages.get(message_id).map(|m| m.clone()))
    }

    async fn delete(&self, message_id: &str) -> Result<bool, anyhow::Error> {
        Ok(self.messages.remove(message_id).is_some())
    }

    async fn list(
        &self,
        limit: usize,
        last_key: Option<&str>,
    ) -> Result<MessagePage, anyhow::Error> {
        let mut all: Vec<Message> = self.messages.iter().map(|m| m.value().clone()).collect();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.message_id.cmp(&a.message_id))
        });

        // An unknown cursor (e.g. a since-deleted message) restarts from the top.
        let start = last_key
            .and_then(|key| all.iter().position(|m| m.message_id == key))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        let remaining = all.len().saturating_sub(start);
        let messages: Vec<Message> = all.into_iter().skip(start).take(limit).collect();
        let last_key = if remaining > limit {
            messages.last().map(|m| m.message_id.clone())
        } else {
            None
        };

        Ok(MessagePage { messages, last_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationProfile;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new(
            email,
            "hash".to_string(),
            "salt".to_string(),
            RegistrationProfile::default(),
        )
    }

    fn message_at(id: &str, minutes_ago: i64) -> Message {
        let mut m = Message::new("user-1", "cow", format!("hello {}", id), "LEVEL 1");
        m.message_id = id.to_string();
        m.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        m
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_email() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        assert!(UserStore::insert(&store, &user("cow@x.com")).await?);
        assert!(!UserStore::insert(&store, &user("COW@x.com")).await?);
        assert!(store.find_by_email("Cow@X.com").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_login_and_status() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        UserStore::insert(&store, &user("cow@x.com")).await?;

        let now = Utc::now();
        store.record_login("cow@x.com", now).await?;
        assert!(store.set_status("cow@x.com", "active").await?);
        assert!(!store.set_status("nobody@x.com", "active").await?);

        let found = store.find_by_email("cow@x.com").await?.unwrap();
        assert_eq!(found.last_login, Some(now));
        assert!(found.is_active());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paginates() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        for (id, age) in [("msg-a", 30), ("msg-b", 20), ("msg-c", 10)] {
            MessageStore::insert(&store, &message_at(id, age)).await?;
        }

        let first = store.list(2, None).await?;
        let ids: Vec<_> = first.messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["msg-c", "msg-b"]);
        assert_eq!(first.last_key.as_deref(), Some("msg-b"));

        let second = store.list(2, first.last_key.as_deref()).await?;
        let ids: Vec<_> = second.messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["msg-a"]);
        assert!(second.last_key.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_reports_absence() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        MessageStore::insert(&store, &message_at("msg-a", 1)).await?;

        assert!(store.delete("msg-a").await?);
        assert!(!store.delete("msg-a").await?);
        assert!(store.get("msg-a").await?.is_none());
        Ok(())
    }
}
