//! Redis-backed store.
//!
//! The connection is opened lazily on first use and re-attempted on every
//! call after a failure, so a scheduler can start (and keep running) while
//! redis is down. Operations map 1:1 onto redis commands; the persistence
//! adapter downgrades every error here to a warning.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::debug;

use tempoq_core::{Error, Result};

use crate::backend::KeyListStore;

fn store_err(e: redis::RedisError) -> Error {
    Error::Store(e.to_string())
}

/// Redis implementation of [`KeyListStore`].
pub struct RedisStore {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Prepare a store for a `redis://` URL (see `StoreConfig::url`).
    /// Nothing is dialed until the first operation.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(store_err)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn manager(&self) -> Result<ConnectionManager> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let manager = ConnectionManager::new(self.client.clone())
            .await
            .map_err(store_err)?;
        debug!("connected to redis");
        *guard = Some(manager.clone());
        Ok(manager)
    }
}

#[async_trait]
impl KeyListStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager().await?;
        conn.get(key).await.map_err(store_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager().await?;
        conn.set(key, value).await.map_err(store_err)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.manager().await?;
        conn.del(key).await.map_err(store_err)
    }

    async fn lpush(&self, list: &str, element: &str) -> Result<()> {
        let mut conn = self.manager().await?;
        conn.lpush(list, element).await.map_err(store_err)
    }

    async fn lrange(&self, list: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut conn = self.manager().await?;
        conn.lrange(list, start as isize, stop as isize)
            .await
            .map_err(store_err)
    }

    async fn lrem(&self, list: &str, element: &str) -> Result<()> {
        let mut conn = self.manager().await?;
        // count 0: remove every occurrence
        conn.lrem(list, 0, element).await.map_err(store_err)
    }

    async fn save(&self) -> Result<()> {
        let mut conn = self.manager().await?;
        // Background save; a foreground SAVE would stall redis.
        let _: () = redis::cmd("BGSAVE")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut guard = self.conn.lock().await;
        *guard = None;
        debug!("dropped redis connection");
    }
}
