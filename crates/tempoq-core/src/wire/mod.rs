//! Wire protocol — multipart frames, job messages, and schedule identity.
//!
//! Everything the scheduler puts on (or takes off) a socket lives here:
//! the command vocabulary, the frame envelope, the five-field job message,
//! its header tokens, and the SHA-1 schedule hash that gives every logical
//! job exactly one identity.

pub mod frame;
pub mod job;

pub use frame::{Command, Frame, PROTOCOL_VERSION, SHOW_SCHEDULED_JOBS};
pub use job::{
    has_nohaste, rewrite_run_count, run_count_from_headers, schedule_hash, JobMessage,
    INFINITE_RUN_COUNT,
};
