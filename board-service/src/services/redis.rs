use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, Client};
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;

use crate::models::{Message, MessagePage, User};
use crate::services::revocation::{retention_deadline, RevocationLedger};
use crate::services::store::{user_key, MessageStore, UserStore};

const MESSAGE_INDEX_KEY: &str = "messages:by_time";

// Hash fields of a user entry. `status` and `last_login` are written on their
// own so the approval tooling and sign-in never overwrite each other.
const FIELD_RECORD: &str = "record";
const FIELD_STATUS: &str = "status";
const FIELD_LAST_LOGIN: &str = "last_login";

fn user_entry_key(email: &str) -> String {
    format!("user:{}", user_key(email))
}

fn message_key(message_id: &str) -> String {
    format!("message:{}", message_id)
}

fn revoked_key(token: &str) -> String {
    format!("revoked:{}", token)
}

/// Redis-backed identity store, message store and revocation ledger.
#[derive(Clone)]
pub struct RedisStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn new(url: &Secret<String>) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url.expose_secret().as_str())?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    async fn ping(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Inclusive `ZREVRANGE` bounds for a page: starts after the cursor's rank
/// (or at the top for an unknown cursor) and reads one id past `limit`.
fn page_range(cursor_rank: Option<usize>, limit: usize) -> (usize, usize) {
    let start = cursor_rank.map(|r| r + 1).unwrap_or(0);
    (start, start + limit)
}

/// Cut the fetched ids down to one page; the cursor is set only when the
/// extra id shows another page exists.
fn split_page(mut ids: Vec<String>, limit: usize) -> (Vec<String>, Option<String>) {
    let has_more = ids.len() > limit;
    ids.truncate(limit);
    let last_key = if has_more { ids.last().cloned() } else { None };
    (ids, last_key)
}

/// `EXAT` deadline for a revocation entry, or `None` when it has already passed.
fn revocation_expiry(token_exp: i64, now: i64) -> Option<i64> {
    let deadline = retention_deadline(token_exp);
    (deadline > now).then_some(deadline)
}

/// Rebuild a user from its hash fields, letting the standalone fields win.
fn user_from_fields(fields: HashMap<String, String>) -> Result<Option<User>, anyhow::Error> {
    let Some(record) = fields.get(FIELD_RECORD) else {
        return Ok(None);
    };

    let mut user: User = serde_json::from_str(record)
        .map_err(|e| anyhow::anyhow!("Failed to decode user record: {}", e))?;

    if let Some(status) = fields.get(FIELD_STATUS) {
        user.status = status.clone();
    }
    if let Some(last_login) = fields.get(FIELD_LAST_LOGIN) {
        let at = DateTime::parse_from_rfc3339(last_login)
            .map_err(|e| anyhow::anyhow!("Failed to decode last login: {}", e))?;
        user.last_login = Some(at.with_timezone(&Utc));
    }

    Ok(Some(user))
}

#[async_trait]
impl UserStore for RedisStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(user_entry_key(email))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read user: {}", e))?;

        user_from_fields(fields)
    }

    async fn insert(&self, user: &User) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let record = serde_json::to_string(user)?;

        let created: bool = redis::cmd("HSETNX")
            .arg(user_entry_key(&user.email))
            .arg(FIELD_RECORD)
            .arg(record)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create user: {}", e))?;

        Ok(created)
    }

    async fn record_login(&self, email: &str, at: DateTime<Utc>) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("HSET")
            .arg(user_entry_key(email))
            .arg(FIELD_LAST_LOGIN)
            .arg(at.to_rfc3339())
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to record login: {}", e))
    }

    async fn set_status(&self, email: &str, status: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = user_entry_key(email);

        let exists: bool = redis::cmd("HEXISTS")
            .arg(&key)
            .arg(FIELD_RECORD)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read user: {}", e))?;
        if !exists {
            return Ok(false);
        }

        redis::cmd("HSET")
            .arg(&key)
            .arg(FIELD_STATUS)
            .arg(status)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set status: {}", e))?;

        Ok(true)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.ping().await
    }
}

#[async_trait]
impl MessageStore for RedisStore {
    async fn insert(&self, message: &Message) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let body = serde_json::to_string(message)?;

        redis::cmd("SET")
            .arg(message_key(&message.message_id))
            .arg(body)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store message: {}", e))?;

        // Index write is independent of the record write; a missing index
        // entry only hides the message from listings.
        redis::cmd("ZADD")
            .arg(MESSAGE_INDEX_KEY)
            .arg(message.timestamp.timestamp_millis())
            .arg(&message.message_id)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to index message: {}", e))?;

        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Option<Message>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let body: Option<String> = redis::cmd("GET")
            .arg(message_key(message_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read message: {}", e))?;

        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(|e| anyhow::anyhow!("Failed to decode message: {}", e))
    }

    async fn delete(&self, message_id: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(message_key(message_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete message: {}", e))?;

        redis::cmd("ZREM")
            .arg(MESSAGE_INDEX_KEY)
            .arg(message_id)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to unindex message: {}", e))?;

        Ok(removed > 0)
    }

    async fn list(
        &self,
        limit: usize,
        last_key: Option<&str>,
    ) -> Result<MessagePage, anyhow::Error> {
        let mut conn = self.manager.clone();

        let cursor_rank: Option<usize> = match last_key {
            Some(key) => redis::cmd("ZREVRANK")
                .arg(MESSAGE_INDEX_KEY)
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to locate cursor: {}", e))?,
            None => None,
        };
        let (start, stop) = page_range(cursor_rank, limit);

        let ids: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(MESSAGE_INDEX_KEY)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list messages: {}", e))?;

        let (page_ids, last_key) = split_page(ids, limit);
        if page_ids.is_empty() {
            return Ok(MessagePage {
                messages: Vec::new(),
                last_key: None,
            });
        }

        let keys: Vec<String> = page_ids.iter().map(|id| message_key(id)).collect();
        let bodies: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read messages: {}", e))?;

        let mut messages = Vec::with_capacity(bodies.len());
        for body in bodies.into_iter().flatten() {
            match serde_json::from_str::<Message>(&body) {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable message"),
            }
        }

        Ok(MessagePage { messages, last_key })
    }
}

#[async_trait]
impl RevocationLedger for RedisStore {
    async fn revoke(&self, token: &str, token_exp: i64) -> Result<(), anyhow::Error> {
        let now = Utc::now().timestamp();
        let Some(deadline) = revocation_expiry(token_exp, now) else {
            // Entry would already be past retention; nothing to keep.
            return Ok(());
        };

        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(revoked_key(token))
            .arg(now)
            .arg("EXAT")
            .arg(deadline)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke token: {}", e))
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(revoked_key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check revocation: {}", e))?;

        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.ping().await
    }
}
