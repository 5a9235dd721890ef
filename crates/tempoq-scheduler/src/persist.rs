//! Persistence adapter — mirrors the catalog into the backing store.
//!
//! The store holds a list of schedule hashes under `interval_jobs` (the
//! name is historical; cron hashes live there too) and one key per hash
//! whose value is the serialized job message exactly as received. The
//! in-memory catalog is the authority everywhere except at startup; every
//! write here is best-effort.

use std::sync::Arc;

use tracing::{debug, warn};

use tempoq_core::wire::{rewrite_run_count, JobMessage};
use tempoq_core::Result;
use tempoq_store::KeyListStore;

/// List key holding every persisted schedule hash.
pub const SCHEDULE_LIST_KEY: &str = "interval_jobs";

/// Best-effort mirror of the schedule catalog.
pub struct PersistenceAdapter {
    store: Arc<dyn KeyListStore>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyListStore>) -> Self {
        Self { store }
    }

    /// Read every persisted job message, in list order.
    ///
    /// A hash listed without a value is logged and skipped; an unreachable
    /// store yields an empty result so the service starts with an empty
    /// catalog.
    pub async fn load_all(&self) -> Vec<(String, JobMessage)> {
        let hashes = match self.store.lrange(SCHEDULE_LIST_KEY, 0, -1).await {
            Ok(hashes) => hashes,
            Err(e) => {
                warn!(error = %e, "could not contact backing store");
                return Vec::new();
            }
        };

        let mut jobs = Vec::new();
        for hash in hashes {
            debug!(hash = %hash, "restoring job");
            match self.store.get(&hash).await {
                Ok(Some(value)) => match serde_json::from_str::<JobMessage>(&value) {
                    Ok(message) => jobs.push((hash, message)),
                    Err(e) => {
                        warn!(hash = %hash, error = %e, "stored value is not a job message, skipping")
                    }
                },
                Ok(None) => {
                    warn!(hash = %hash, "expected scheduled job in store, but none was found")
                }
                Err(e) => warn!(hash = %hash, error = %e, "could not read job from store"),
            }
        }
        jobs
    }

    /// Write a job message under its hash and list the hash exactly once.
    pub async fn persist(&self, hash: &str, message: &JobMessage) {
        let result: Result<()> = async {
            let listed = self.store.lrange(SCHEDULE_LIST_KEY, 0, -1).await?;
            if !listed.iter().any(|h| h == hash) {
                self.store.lpush(SCHEDULE_LIST_KEY, hash).await?;
            }
            let value = serde_json::to_string(message)?;
            self.store.set(hash, &value).await?;
            self.store.save().await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => debug!(hash = %hash, "saved job to store"),
            Err(e) => warn!(
                hash = %hash, error = %e,
                "could not contact backing store, unable to guarantee persistence"
            ),
        }
    }

    /// Delete a hash's value and list entry. Idempotent.
    pub async fn forget(&self, hash: &str) {
        let result: Result<()> = async {
            self.store.del(hash).await?;
            self.store.lrem(SCHEDULE_LIST_KEY, hash).await?;
            self.store.save().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(hash = %hash, error = %e, "could not remove job from store");
        }
    }

    /// Rewrite the stored message's `run_count:*` header.
    ///
    /// Failure is tolerated: at worst one decrement is lost and crash
    /// recovery dispatches once more than asked.
    pub async fn update_run_count(&self, hash: &str, new_count: i64) {
        let result: Result<()> = async {
            let value = match self.store.get(hash).await? {
                Some(v) => v,
                None => return Ok(()),
            };
            let mut message: JobMessage = serde_json::from_str(&value)?;
            message.headers = rewrite_run_count(&message.headers, new_count);
            self.store.set(hash, &serde_json::to_string(&message)?).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(hash = %hash, error = %e, "unable to update run count in store");
        }
    }

    /// Drop the store connection (DISCONNECT handling).
    pub async fn disconnect(&self) {
        self.store.disconnect().await;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempoq_store::MemoryStore;

    fn message(run_count: i64) -> JobMessage {
        JobMessage {
            queue: "default".to_string(),
            headers: format!("run_count:{}", run_count),
            interval_secs: 60,
            payload: "[\"run\", {\"path\": \"p\", \"callable\": \"c\"}]".to_string(),
            cron_expr: String::new(),
        }
    }

    fn adapter() -> (PersistenceAdapter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PersistenceAdapter::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let (adapter, _store) = adapter();
        let msg = message(3);
        adapter.persist("aaa", &msg).await;

        let jobs = adapter.load_all().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, "aaa");
        assert_eq!(jobs[0].1, msg);
    }

    #[tokio::test]
    async fn test_persist_lists_hash_once() {
        let (adapter, store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        adapter.persist("aaa", &message(5)).await;

        let listed = store.lrange(SCHEDULE_LIST_KEY, 0, -1).await.unwrap();
        assert_eq!(listed, vec!["aaa".to_string()]);
        // Latest write wins
        let jobs = adapter.load_all().await;
        assert_eq!(jobs[0].1.run_count(), 5);
    }

    #[tokio::test]
    async fn test_forget_is_idempotent() {
        let (adapter, store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        adapter.forget("aaa").await;
        adapter.forget("aaa").await;

        assert!(adapter.load_all().await.is_empty());
        assert_eq!(store.get("aaa").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_skips_missing_value() {
        let (adapter, store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        store.lpush(SCHEDULE_LIST_KEY, "ghost").await.unwrap();

        let jobs = adapter.load_all().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, "aaa");
    }

    #[tokio::test]
    async fn test_load_skips_corrupt_value() {
        let (adapter, store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        store.lpush(SCHEDULE_LIST_KEY, "bad").await.unwrap();
        store.set("bad", "{not json").await.unwrap();

        let jobs = adapter.load_all().await;
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_load_unreachable_store_is_empty() {
        let (adapter, store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        store.set_fail_all(true);
        assert!(adapter.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_persist_survives_unreachable_store() {
        let (adapter, store) = adapter();
        store.set_fail_all(true);
        // Must not panic or propagate
        adapter.persist("aaa", &message(3)).await;
        store.set_fail_all(false);
        assert!(adapter.load_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_run_count_rewrites_headers() {
        let (adapter, _store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        adapter.update_run_count("aaa", 2).await;

        let jobs = adapter.load_all().await;
        assert_eq!(jobs[0].1.run_count(), 2);
        assert_eq!(jobs[0].1.headers, "run_count:2");
    }

    #[tokio::test]
    async fn test_update_run_count_missing_key_is_noop() {
        let (adapter, _store) = adapter();
        adapter.update_run_count("ghost", 2).await;
    }

    #[tokio::test]
    async fn test_update_run_count_tolerates_failure() {
        let (adapter, store) = adapter();
        adapter.persist("aaa", &message(3)).await;
        store.set_fail_all(true);
        adapter.update_run_count("aaa", 2).await;
        store.set_fail_all(false);
        // Old count still stored
        assert_eq!(adapter.load_all().await[0].1.run_count(), 3);
    }
}
