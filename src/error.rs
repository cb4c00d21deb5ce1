//! Error types for the chat server
//!
//! Defines startup/session errors, per-client delivery errors and the
//! recoverable name-conflict outcome. Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Usage line printed when the startup arguments are rejected
pub const USAGE: &str = "[USAGE]: ./TCPChat $port";

/// Application-level errors
///
/// `Bind` is fatal to the whole process. Everything else is scoped to a
/// single connection and ends that session only.
#[derive(Debug, Error)]
pub enum AppError {
    /// Listening endpoint could not be created (fatal)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error on a connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing or UTF-8 decoding failure
    #[error("line codec error: {0}")]
    Lines(#[from] LinesCodecError),

    /// Write to this connection failed
    #[error("send error: {0}")]
    Send(#[from] SendError),

    /// Client did not pick a name in time
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// `start` called without a bound listener
    #[error("server is not listening")]
    NotListening,

    /// Invalid startup arguments
    #[error("[USAGE]: ./TCPChat $port")]
    Usage,
}

/// Delivery error on a single client's output sink
///
/// Never fatal to the broadcaster: the failing client is skipped and
/// will hit a read error on its own connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// Write or flush to the client failed
    #[error("write to client failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The requested display name is already held by an online session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("name '{0}' is already taken")]
pub struct NameTaken(pub String);
