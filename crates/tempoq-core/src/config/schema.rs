//! Configuration schema — typed settings for the scheduler service.
//!
//! Hierarchy: `Config` → `StoreConfig`, `HeartbeatConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.tempoq/config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Device-name prefix for this scheduler instance.
    pub name: String,
    /// Bind address for the administrative socket.
    pub administrative_listen_addr: String,
    /// Broker dial address for dispatching requests.
    pub connect_addr: String,
    /// Upper bound on one transport poll, in milliseconds.
    pub poll_timeout_ms: u64,
    pub store: StoreConfig,
    pub heartbeat: HeartbeatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "tempoq".to_string(),
            administrative_listen_addr: "tcp://127.0.0.1:10949".to_string(),
            connect_addr: "tcp://127.0.0.1:10947".to_string(),
            poll_timeout_ms: 1000,
            store: StoreConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Backing store
// ─────────────────────────────────────────────

/// Connection settings for the key/list backing store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl StoreConfig {
    /// Connection URL in `redis://` form.
    pub fn url(&self) -> String {
        match &self.password {
            Some(pass) => format!("redis://:{}@{}:{}/{}", pass, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

// ─────────────────────────────────────────────
// Heartbeat
// ─────────────────────────────────────────────

/// Peer-liveness settings for the broker connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatConfig {
    /// Seconds between outgoing heartbeats.
    pub interval_secs: u64,
    /// Missed intervals tolerated before the peer is considered lost.
    pub liveness: u32,
    pub enabled: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            liveness: 3,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.name, "tempoq");
        assert_eq!(cfg.poll_timeout_ms, 1000);
        assert_eq!(cfg.store.port, 6379);
        assert_eq!(cfg.heartbeat.interval_secs, 3);
        assert!(cfg.heartbeat.enabled);
    }

    #[test]
    fn test_store_url_without_password() {
        let store = StoreConfig::default();
        assert_eq!(store.url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_store_url_with_password() {
        let store = StoreConfig {
            password: Some("hunter2".to_string()),
            ..StoreConfig::default()
        };
        assert_eq!(store.url(), "redis://:hunter2@127.0.0.1:6379/0");
    }

    #[test]
    fn test_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("administrativeListenAddr").is_some());
        assert!(json.get("connectAddr").is_some());
        assert!(json.get("administrative_listen_addr").is_none());
    }
}
