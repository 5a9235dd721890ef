//! Frame envelope — the multipart layout shared by every peer.
//!
//! Dealer-side layout:
//! ```text
//! ["", "TPQ/1.0", <command>, <msgid>, <body>...]
//! ```
//! Router-side (admin socket) messages carry the peer identity first:
//! ```text
//! [<peer>, "", "TPQ/1.0", <command>, <msgid>, <body>...]
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Protocol version token carried in every frame.
pub const PROTOCOL_VERSION: &str = "TPQ/1.0";

/// Administrative sub-command requesting the full schedule snapshot.
pub const SHOW_SCHEDULED_JOBS: &str = "show_scheduled_jobs";

// ─────────────────────────────────────────────
// Command
// ─────────────────────────────────────────────

/// Command tokens recognized on the control and peer sockets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Schedule,
    Unschedule,
    Status,
    Heartbeat,
    Disconnect,
    Kbye,
    Reply,
    Request,
    Ready,
    /// Envelope for administrative sub-commands on the admin socket.
    StatusCmd,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Schedule => "SCHEDULE",
            Command::Unschedule => "UNSCHEDULE",
            Command::Status => "STATUS",
            Command::Heartbeat => "HEARTBEAT",
            Command::Disconnect => "DISCONNECT",
            Command::Kbye => "KBYE",
            Command::Reply => "REPLY",
            Command::Request => "REQUEST",
            Command::Ready => "READY",
            Command::StatusCmd => "STATUS_CMD",
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SCHEDULE" => Ok(Command::Schedule),
            "UNSCHEDULE" => Ok(Command::Unschedule),
            "STATUS" => Ok(Command::Status),
            "HEARTBEAT" => Ok(Command::Heartbeat),
            "DISCONNECT" => Ok(Command::Disconnect),
            "KBYE" => Ok(Command::Kbye),
            "REPLY" => Ok(Command::Reply),
            "REQUEST" => Ok(Command::Request),
            "READY" => Ok(Command::Ready),
            "STATUS_CMD" => Ok(Command::StatusCmd),
            other => Err(Error::Frame(format!("unknown command {:?}", other))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// Frame
// ─────────────────────────────────────────────

/// A decoded multipart message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Router envelope: the peer identity, present only on routed sockets.
    pub peer: Option<String>,
    pub command: Command,
    pub msgid: String,
    pub body: Vec<String>,
}

impl Frame {
    /// Build a dealer-side frame with a fresh message id.
    pub fn new(command: Command, body: Vec<String>) -> Self {
        Self {
            peer: None,
            command,
            msgid: uuid::Uuid::new_v4().to_string(),
            body,
        }
    }

    /// Build a routed frame addressed to `peer` (admin socket replies).
    pub fn routed(peer: impl Into<String>, command: Command, body: Vec<String>) -> Self {
        Self {
            peer: Some(peer.into()),
            ..Self::new(command, body)
        }
    }

    /// Encode into multipart frames ready for a socket.
    pub fn encode(&self) -> Vec<String> {
        let mut frames = Vec::with_capacity(self.body.len() + 5);
        if let Some(peer) = &self.peer {
            frames.push(peer.clone());
        }
        frames.push(String::new());
        frames.push(PROTOCOL_VERSION.to_string());
        frames.push(self.command.as_str().to_string());
        frames.push(self.msgid.clone());
        frames.extend(self.body.iter().cloned());
        frames
    }

    /// Decode a multipart message.
    ///
    /// The router envelope is detected from the frames themselves: a
    /// leading non-empty frame followed by the empty delimiter is a peer
    /// identity.
    pub fn decode(frames: &[String]) -> Result<Self> {
        let (peer, rest) = match frames.first() {
            Some(f) if f.is_empty() => (None, &frames[1..]),
            Some(f) => {
                if frames.get(1).map(|d| d.is_empty()) != Some(true) {
                    return Err(Error::Frame("missing delimiter after peer".to_string()));
                }
                (Some(f.clone()), &frames[2..])
            }
            None => return Err(Error::Frame("empty multipart".to_string())),
        };

        if rest.len() < 3 {
            return Err(Error::Frame(format!("short frame: {} parts", frames.len())));
        }
        if rest[0] != PROTOCOL_VERSION {
            return Err(Error::Frame(format!("bad protocol version {:?}", rest[0])));
        }

        Ok(Self {
            peer,
            command: rest[1].parse()?,
            msgid: rest[2].clone(),
            body: rest[3..].to_vec(),
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
