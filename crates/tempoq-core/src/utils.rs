//! Utility helpers — path resolution and device naming.

use std::path::PathBuf;

/// Get the Tempoq data directory (e.g. `~/.tempoq/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".tempoq")
}

/// Generate a unique device name from a configured prefix.
///
/// Every running service instance gets its own name so peers and status
/// output can tell schedulers apart (e.g. `"tempoq-3f9a1c02"`).
pub fn generate_device_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

/// Helper to get home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}
