//! Shared error type used across all Tempoq crates.

/// Errors surfaced by the scheduler's plumbing.
///
/// The dispatch loop treats almost all of these as non-fatal: they are
/// logged and the tick continues. Only an explicit disconnect or peer
/// loss terminates the service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Transport(String),

    #[error("store: {0}")]
    Store(String),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("malformed job message: {0}")]
    Malformed(String),

    #[error("cron expression: {0}")]
    Cron(String),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
