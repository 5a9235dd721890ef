//! Store trait and the in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use tempoq_core::{Error, Result};

// ─────────────────────────────────────────────
// KeyListStore
// ─────────────────────────────────────────────

/// A key/value store with list support, in the shape the scheduler uses.
///
/// Every call is fallible; the persistence adapter treats failures as
/// best-effort (logged, never fatal). `save` is a flush-to-disk hint the
/// store may ignore.
#[async_trait]
pub trait KeyListStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Prepend `element` to the named list.
    async fn lpush(&self, list: &str, element: &str) -> Result<()>;
    /// Read the inclusive index range; negative indices count from the end.
    async fn lrange(&self, list: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    /// Remove all occurrences of `element` from the named list.
    async fn lrem(&self, list: &str, element: &str) -> Result<()>;
    async fn save(&self) -> Result<()>;
    /// Drop the connection, if there is one.
    async fn disconnect(&self) {}
}

// ─────────────────────────────────────────────
// MemoryStore
// ─────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    keys: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

/// In-memory store for tests and embedded use.
///
/// `set_fail_all(true)` makes every operation return an error, simulating
/// an unreachable store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_all: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(Error::Store("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn clamp_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let resolve = |i: i64| if i < 0 { len + i } else { i };
    let start = resolve(start).max(0);
    let stop = resolve(stop).min(len - 1);
    if start > stop || len == 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

#[async_trait]
impl KeyListStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.inner.lock().unwrap().keys.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .unwrap()
            .keys
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.lock().unwrap().keys.remove(key);
        Ok(())
    }

    async fn lpush(&self, list: &str, element: &str) -> Result<()> {
        self.check()?;
        self.inner
            .lock()
            .unwrap()
            .lists
            .entry(list.to_string())
            .or_default()
            .insert(0, element.to_string());
        Ok(())
    }

    async fn lrange(&self, list: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        let items = match inner.lists.get(list) {
            Some(items) => items,
            None => return Ok(Vec::new()),
        };
        Ok(match clamp_range(items.len(), start, stop) {
            Some((a, b)) => items[a..=b].to_vec(),
            None => Vec::new(),
        })
    }

    async fn lrem(&self, list: &str, element: &str) -> Result<()> {
        self.check()?;
        if let Some(items) = self.inner.lock().unwrap().lists.get_mut(list) {
            items.retain(|e| e != element);
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        self.check()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_del() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lpush_prepends() {
        let store = MemoryStore::new();
        store.lpush("l", "a").await.unwrap();
        store.lpush("l", "b").await.unwrap();
        let items = store.lrange("l", 0, -1).await.unwrap();
        assert_eq!(items, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_lrange_missing_list_is_empty() {
        let store = MemoryStore::new();
        assert!(store.lrange("nope", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lrange_subrange() {
        let store = MemoryStore::new();
        for e in ["c", "b", "a"] {
            store.lpush("l", e).await.unwrap();
        }
        assert_eq!(
            store.lrange("l", 1, 2).await.unwrap(),
            vec!["b".to_string(), "c".to_string()]
        );
        assert!(store.lrange("l", 5, 9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lrem_removes_all_occurrences() {
        let store = MemoryStore::new();
        for e in ["x", "y", "x"] {
            store.lpush("l", e).await.unwrap();
        }
        store.lrem("l", "x").await.unwrap();
        assert_eq!(store.lrange("l", 0, -1).await.unwrap(), vec!["y".to_string()]);
    }

    #[tokio::test]
    async fn test_lrem_missing_list_ok() {
        let store = MemoryStore::new();
        store.lrem("nope", "x").await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_all() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        store.set_fail_all(true);
        assert!(store.get("k").await.is_err());
        assert!(store.set("k", "v2").await.is_err());
        assert!(store.save().await.is_err());
        store.set_fail_all(false);
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
