//! tempoq-store — the key/list backing store behind the schedule catalog.
//!
//! The scheduler only ever needs seven operations (`GET`, `SET`, `DEL`,
//! `LPUSH`, `LRANGE`, `LREM`, and a flush hint), so the store is a small
//! async trait with two implementations: an in-memory one for tests and a
//! Redis one for production.

pub mod backend;
pub mod redis_store;

pub use backend::{KeyListStore, MemoryStore};
pub use redis_store::RedisStore;
