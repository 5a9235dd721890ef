//! Transport abstraction — the two sockets the dispatch loop runs on.
//!
//! The loop never names a concrete transport: it owns `Box<dyn Socket>`
//! values and speaks multipart string frames. `inproc` wires two ends
//! together over channels for tests; `zmq` adapts real ZeroMQ sockets for
//! the service binary.

pub mod inproc;
pub mod zmq;

use async_trait::async_trait;

use crate::error::Result;

/// A non-blocking multipart socket.
#[async_trait]
pub trait Socket: Send {
    /// Send one multipart message.
    async fn send_multipart(&mut self, frames: Vec<String>) -> Result<()>;

    /// Wait for the next multipart message. `None` means the peer is gone.
    async fn recv_multipart(&mut self) -> Option<Vec<String>>;
}
