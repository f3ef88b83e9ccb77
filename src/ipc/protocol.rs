//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::events::MuteEvent;

/// Frames larger than this close the connection
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from the menu bar app to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Toggle microphone mute ("Toggle Mute" menu item)
    Toggle,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to mute event notifications
    Subscribe,

    /// Stop the daemon ("Quit" menu item)
    Quit,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Mute state after a toggle
    MuteState { muted: bool },

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Quit accepted
    ShuttingDown,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: MuteEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the microphone is muted
    pub muted: bool,

    /// Whether the global shortcut is registered
    pub hotkey_registered: bool,

    /// Gestures recognized since start
    pub gestures_detected: u64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            muted: false,
            hotkey_registered: false,
            gestures_detected: 0,
            uptime_secs: 0,
        }
    }
}

/// Read one length-prefixed JSON frame. `Ok(None)` on clean EOF.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame too large: {} bytes", len);
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;

    let msg = serde_json::from_slice(&msg_buf).context("failed to parse frame")?;
    Ok(Some(msg))
}

/// Write one length-prefixed JSON frame
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}
