//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use tempoq_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Broker: {}", cfg.connect_addr);
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config};
pub use schema::{Config, HeartbeatConfig, StoreConfig};
