use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Extra time a revocation entry outlives the token it revokes.
///
/// Covers clock skew between instances and requests already in flight.
pub const REVOCATION_BUFFER_SECONDS: i64 = 24 * 60 * 60;

/// Unix time after which a revocation entry for a token expiring at
/// `token_exp` may be purged.
pub fn retention_deadline(token_exp: i64) -> i64 {
    token_exp + REVOCATION_BUFFER_SECONDS
}

/// Record of tokens invalidated before their natural expiry.
///
/// Entries are keyed by the exact raw token string. Implementations must keep
/// an entry visible until at least its retention deadline and may drop it
/// any time after.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Idempotent: revoking an already-revoked token succeeds.
    async fn revoke(&self, token: &str, token_exp: i64) -> Result<(), anyhow::Error>;

    /// Absence means "not known to be revoked", not "valid".
    async fn is_revoked(&self, token: &str) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

/// Process-local ledger for single-instance deployments and tests.
///
/// Reads honour the retention deadline on their own; the sweep only
/// reclaims memory.
#[derive(Default)]
pub struct InMemoryRevocationLedger {
    entries: DashMap<String, i64>,
}

impl InMemoryRevocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose retention deadline is before `now`; returns how many.
    pub fn sweep_at(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, deadline| *deadline >= now);
        before.saturating_sub(self.entries.len())
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now().timestamp())
    }

    pub fn is_revoked_at(&self, token: &str, now: i64) -> bool {
        self.entries
            .get(token)
            .map(|deadline| *deadline >= now)
            .unwrap_or(false)
    }

    /// Run `sweep` every `interval` until the handle is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = self.sweep();
                if purged > 0 {
                    tracing::debug!(purged, remaining = self.len(), "Swept revocation ledger");
                }
            }
        })
    }
}

#[async_trait]
impl RevocationLedger for InMemoryRevocationLedger {
    async fn revoke(&self, token: &str, token_exp: i64) -> Result<(), anyhow::Error> {
        let deadline = retention_deadline(token_exp);
        self.entries
            .entry(token.to_string())
            .and_modify(|d| *d = (*d).max(deadline))
            .or_insert(deadline);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, anyhow::Error> {
        Ok(self.is_revoked_at(token, Utc::now().timestamp()))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revoke_then_lookup() -> Result<(), anyhow::Error> {
        let ledger = InMemoryRevocationLedger::new();
        let exp = Utc::now().timestamp() + 3600;

        assert!(!ledger.is_revoked("tok").await?);
        ledger.revoke("tok", exp).await?;
        assert!(ledger.is_revoked("tok").await?);
        assert!(!ledger.is_revoked("tok2").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() -> Result<(), anyhow::Error> {
        let ledger = InMemoryRevocationLedger::new();
        let exp = Utc::now().timestamp() + 3600;

        ledger.revoke("tok", exp).await?;
        ledger.revoke("tok", exp).await?;
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_revoked("tok").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_entry_survives_until_deadline() -> Result<(), anyhow::Error> {
        let ledger = InMemoryRevocationLedger::new();
        let exp = 1_000_000;
        ledger.revoke("tok", exp).await?;

        // Token itself is expired, but the entry is still inside its buffer.
        assert!(ledger.is_revoked_at("tok", exp + 1));
        assert!(ledger.is_revoked_at("tok", retention_deadline(exp)));
        assert!(!ledger.is_revoked_at("tok", retention_deadline(exp) + 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_only_drops_expired_entries() -> Result<(), anyhow::Error> {
        let ledger = InMemoryRevocationLedger::new();
        ledger.revoke("old", 1_000).await?;
        ledger.revoke("new", 5_000_000).await?;

        let purged = ledger.sweep_at(retention_deadline(1_000) + 1);
        assert_eq!(purged, 1);
        assert!(ledger.is_revoked_at("new", retention_deadline(1_000) + 1));
        assert_eq!(ledger.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sweeper_task_purges() -> Result<(), anyhow::Error> {
        let ledger = Arc::new(InMemoryRevocationLedger::new());
        ledger.revoke("stale", 0).await?;

        let handle = ledger.clone().spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(ledger.is_empty());
        Ok(())
    }
}
