//! ZeroMQ transport — DEALER toward the broker, ROUTER for the admin
//! socket.
//!
//! The ROUTER socket prepends the peer identity frame on receive and
//! expects it back on send, which lines up with the routed frame layout in
//! `wire::frame`.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;
use zeromq::{DealerSocket, RouterSocket, Socket as _, SocketRecv, SocketSend, ZmqMessage};

use super::Socket;
use crate::error::{Error, Result};

// ─────────────────────────────────────────────
// Frame conversion
// ─────────────────────────────────────────────

fn to_zmq(frames: Vec<String>) -> Result<ZmqMessage> {
    let mut iter = frames.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::Transport("empty multipart".to_string()))?;
    let mut msg = ZmqMessage::from(first);
    for frame in iter {
        msg.push_back(Bytes::from(frame.into_bytes()));
    }
    Ok(msg)
}

fn from_zmq(msg: ZmqMessage) -> Vec<String> {
    msg.into_vec()
        .into_iter()
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .collect()
}

// ─────────────────────────────────────────────
// Dealer (broker-facing)
// ─────────────────────────────────────────────

/// Connected DEALER socket used for broker traffic.
pub struct DealerTransport {
    socket: DealerSocket,
}

impl DealerTransport {
    pub async fn connect(addr: &str) -> Result<Self> {
        let mut socket = DealerSocket::new();
        socket
            .connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("connect {}: {}", addr, e)))?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl Socket for DealerTransport {
    async fn send_multipart(&mut self, frames: Vec<String>) -> Result<()> {
        self.socket
            .send(to_zmq(frames)?)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn recv_multipart(&mut self) -> Option<Vec<String>> {
        match self.socket.recv().await {
            Ok(msg) => Some(from_zmq(msg)),
            Err(e) => {
                warn!(error = %e, "dealer socket receive failed");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────
// Router (admin socket)
// ─────────────────────────────────────────────

/// Bound ROUTER socket for administrative commands.
///
/// ZeroMQ peer identities are raw bytes, not necessarily UTF-8; they are
/// hex-encoded into the first frame on receive and decoded back on send so
/// routing survives the string-frame representation.
pub struct RouterTransport {
    socket: RouterSocket,
}

impl RouterTransport {
    pub async fn bind(addr: &str) -> Result<Self> {
        let mut socket = RouterSocket::new();
        socket
            .bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("bind {}: {}", addr, e)))?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl Socket for RouterTransport {
    async fn send_multipart(&mut self, frames: Vec<String>) -> Result<()> {
        let mut iter = frames.into_iter();
        let peer = iter
            .next()
            .ok_or_else(|| Error::Transport("routed message without peer".to_string()))?;
        let peer_bytes = hex::decode(&peer)
            .map_err(|e| Error::Transport(format!("bad peer id {:?}: {}", peer, e)))?;
        let mut msg = ZmqMessage::from(peer_bytes);
        for frame in iter {
            msg.push_back(Bytes::from(frame.into_bytes()));
        }
        self.socket
            .send(msg)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn recv_multipart(&mut self) -> Option<Vec<String>> {
        match self.socket.recv().await {
            Ok(msg) => {
                let mut frames = msg.into_vec();
                if frames.is_empty() {
                    return Some(Vec::new());
                }
                let peer = hex::encode(frames.remove(0));
                let mut out = Vec::with_capacity(frames.len() + 1);
                out.push(peer);
                out.extend(
                    frames
                        .into_iter()
                        .map(|b| String::from_utf8_lossy(&b).into_owned()),
                );
                Some(out)
            }
            Err(e) => {
                warn!(error = %e, "router socket receive failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_zmq_preserves_frames() {
        let frames: Vec<String> = ["", "TPQ/1.0", "READY", "id"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let msg = to_zmq(frames.clone()).unwrap();
        assert_eq!(from_zmq(msg), frames);
    }

    #[test]
    fn test_to_zmq_rejects_empty() {
        assert!(to_zmq(vec![]).is_err());
    }
}
