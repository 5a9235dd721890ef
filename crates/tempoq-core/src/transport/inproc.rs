//! In-process transport — two cross-wired bounded channels.
//!
//! Stands in for a real socket pair in tests and embedded setups: frames
//! sent on one end arrive on the other, in order.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Socket;
use crate::error::{Error, Result};

/// One end of an in-process socket pair.
pub struct InprocSocket {
    tx: mpsc::Sender<Vec<String>>,
    rx: mpsc::Receiver<Vec<String>>,
}

/// Create a connected pair with the given buffer capacity.
pub fn pair(capacity: usize) -> (InprocSocket, InprocSocket) {
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (
        InprocSocket { tx: a_tx, rx: a_rx },
        InprocSocket { tx: b_tx, rx: b_rx },
    )
}

#[async_trait]
impl Socket for InprocSocket {
    async fn send_multipart(&mut self, frames: Vec<String>) -> Result<()> {
        self.tx
            .send(frames)
            .await
            .map_err(|_| Error::Transport("peer closed".to_string()))
    }

    async fn recv_multipart(&mut self) -> Option<Vec<String>> {
        self.rx.recv().await
    }
}
