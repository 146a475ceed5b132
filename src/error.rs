use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the speaker protocol layer.
///
/// Nothing is retried or swallowed here; callers decide whether a
/// `Transport` error means the link is gone and the connection must be
/// rebuilt.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad command arguments, rejected before any I/O.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed hex input for a raw message.
    #[error("failed to decode hex message: {0}")]
    Encoding(String),

    /// Socket creation or RFCOMM connect failed.
    #[error("RFCOMM connect to {address} on channel {channel} failed: {source}")]
    Connection {
        address: String,
        channel: u8,
        #[source]
        source: io::Error,
    },

    /// Send or receive failed, usually because the speaker went away.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// No matching reply arrived within the read window.
    #[error("no reply from speaker within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Error returned for any use of a transport after `close`.
    pub(crate) fn closed() -> Self {
        Self::Transport(io::Error::new(
            io::ErrorKind::NotConnected,
            "RFCOMM socket already closed",
        ))
    }

    /// True when the error means the link is dead and should be rebuilt.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
