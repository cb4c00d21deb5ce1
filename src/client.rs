//! Client session definition
//!
//! Represents a named, registered client and the sink used to write to it.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::error::SendError;
use crate::types::{ClientId, DisplayName};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Output sink for one connection
///
/// Cheap to clone; every clone writes to the same buffered socket half.
/// Each call writes and flushes while holding the sink lock, so lines from
/// different writers never interleave.
#[derive(Clone)]
pub struct ClientSink {
    writer: Arc<Mutex<BufWriter<BoxedWriter>>>,
}

impl ClientSink {
    /// Wrap the write half of a connection
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedWriter = Box::new(writer);
        Self {
            writer: Arc::new(Mutex::new(BufWriter::new(boxed))),
        }
    }

    /// Write `text` verbatim and flush
    pub async fn send_raw(&self, text: &str) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Write `line` followed by a newline and flush
    pub async fn send_line(&self, line: &str) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for ClientSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSink").finish_non_exhaustive()
    }
}

/// A connected client that completed the handshake
#[derive(Debug, Clone)]
pub struct Session {
    /// Connection identity (registry key)
    pub id: ClientId,
    /// Display name, fixed for the session lifetime
    pub name: DisplayName,
    /// Server → client writer
    pub sink: ClientSink,
}

impl Session {
    pub fn new(id: ClientId, name: DisplayName, sink: ClientSink) -> Self {
        Self { id, name, sink }
    }

    /// Send one line to this client
    pub async fn send(&self, line: &str) -> Result<(), SendError> {
        self.sink.send_line(line).await
    }
}
