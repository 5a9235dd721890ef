//! Peer-liveness heartbeating for the broker connection.
//!
//! The dispatch loop calls `maintain` once per tick: it emits a
//! `HEARTBEAT` frame whenever the send interval has elapsed and reports
//! peer loss when nothing has arrived for `interval * liveness` seconds.
//! Any decoded peer traffic counts as a sign of life, not just heartbeats.

use tracing::{debug, warn};

use tempoq_core::transport::Socket;
use tempoq_core::wire::{Command, Frame};

pub struct Heartbeat {
    interval_secs: f64,
    liveness: u32,
    enabled: bool,
    last_sent_mono: f64,
    last_received_mono: f64,
}

impl Heartbeat {
    pub fn new(interval_secs: u64, liveness: u32, enabled: bool) -> Self {
        Self {
            interval_secs: interval_secs as f64,
            liveness,
            enabled,
            last_sent_mono: 0.0,
            last_received_mono: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reset both stamps; the peer starts out considered alive.
    pub fn start(&mut self, mono_now: f64) {
        self.last_sent_mono = mono_now;
        self.last_received_mono = mono_now;
    }

    /// Record a sign of life from the peer.
    pub fn note_received(&mut self, mono_now: f64) {
        self.last_received_mono = mono_now;
    }

    /// Whether the peer has been silent past the tolerance window.
    pub fn peer_lost(&self, mono_now: f64) -> bool {
        self.enabled
            && mono_now - self.last_received_mono > self.interval_secs * self.liveness as f64
    }

    /// Per-tick maintenance: send if due, then check liveness.
    /// Returns `false` when the peer is considered lost.
    pub async fn maintain(&mut self, socket: &mut dyn Socket, mono_now: f64) -> bool {
        if !self.enabled {
            return true;
        }
        if self.peer_lost(mono_now) {
            warn!(
                silent_secs = mono_now - self.last_received_mono,
                "no heartbeat from peer within tolerance"
            );
            return false;
        }
        if mono_now - self.last_sent_mono >= self.interval_secs {
            let frame = Frame::new(Command::Heartbeat, vec![]);
            if let Err(e) = socket.send_multipart(frame.encode()).await {
                warn!(error = %e, "failed to send heartbeat");
            } else {
                debug!("sent heartbeat");
            }
            self.last_sent_mono = mono_now;
        }
        true
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
