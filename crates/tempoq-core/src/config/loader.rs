//! Config loader — reads `~/.tempoq/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.tempoq/config.json`
//! 3. Environment variables `TEMPOQ_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `TEMPOQ_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `TEMPOQ_NAME` → `name`
/// - `TEMPOQ_ADMINISTRATIVE_LISTEN_ADDR` → `administrative_listen_addr`
/// - `TEMPOQ_CONNECT_ADDR` → `connect_addr`
/// - `TEMPOQ_POLL_TIMEOUT_MS` → `poll_timeout_ms`
/// - `TEMPOQ_STORE__HOST/PORT/DB/PASSWORD` → `store.*`
/// - `TEMPOQ_HEARTBEAT__INTERVAL_SECS/LIVENESS/ENABLED` → `heartbeat.*`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("TEMPOQ_NAME") {
        config.name = val;
    }
    if let Ok(val) = std::env::var("TEMPOQ_ADMINISTRATIVE_LISTEN_ADDR") {
        config.administrative_listen_addr = val;
    }
    if let Ok(val) = std::env::var("TEMPOQ_CONNECT_ADDR") {
        config.connect_addr = val;
    }
    if let Ok(val) = std::env::var("TEMPOQ_POLL_TIMEOUT_MS") {
        if let Ok(n) = val.parse::<u64>() {
            config.poll_timeout_ms = n;
        }
    }

    // Store
    if let Ok(val) = std::env::var("TEMPOQ_STORE__HOST") {
        config.store.host = val;
    }
    if let Ok(val) = std::env::var("TEMPOQ_STORE__PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.store.port = p;
        }
    }
    if let Ok(val) = std::env::var("TEMPOQ_STORE__DB") {
        if let Ok(db) = val.parse::<i64>() {
            config.store.db = db;
        }
    }
    if let Ok(val) = std::env::var("TEMPOQ_STORE__PASSWORD") {
        config.store.password = Some(val);
    }

    // Heartbeat
    if let Ok(val) = std::env::var("TEMPOQ_HEARTBEAT__INTERVAL_SECS") {
        if let Ok(n) = val.parse::<u64>() {
            config.heartbeat.interval_secs = n;
        }
    }
    if let Ok(val) = std::env::var("TEMPOQ_HEARTBEAT__LIVENESS") {
        if let Ok(n) = val.parse::<u32>() {
            config.heartbeat.liveness = n;
        }
    }
    if let Ok(val) = std::env::var("TEMPOQ_HEARTBEAT__ENABLED") {
        config.heartbeat.enabled = val == "true" || val == "1";
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
