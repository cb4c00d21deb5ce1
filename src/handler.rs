//! TCP connection handler
//!
//! Drives one client through its lifecycle: banner, name handshake,
//! registration with history replay, the message loop, and leave.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info};

use crate::client::{ClientSink, Session};
use crate::error::{AppError, NameTaken};
use crate::message::{BANNER, DUPLICATE_NAME, EMPTY_NAME, NAME_PROMPT};
use crate::server::ServerState;
use crate::types::{ClientId, DisplayName};

type LineReader<R> = FramedRead<R, LinesCodec>;

/// Handle a newly admitted connection
///
/// Returns once the client disconnects. A client that registered is always
/// removed from the registry and announced as gone, whatever ended the session.
pub async fn handle_connection<S>(stream: S, state: Arc<ServerState>) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let client_id = ClientId::new();
    let (reader, writer) = tokio::io::split(stream);
    let sink = ClientSink::new(writer);
    let mut lines = FramedRead::new(reader, LinesCodec::new());

    debug!("Client {} connected", client_id);

    sink.send_raw(BANNER).await?;

    let Some(session) = handshake(client_id, &mut lines, sink, &state).await? else {
        debug!("Client {} disconnected before choosing a name", client_id);
        return Ok(());
    };

    let result = message_loop(&session, &mut lines, &state).await;

    state.leave(client_id).await;

    result
}

/// Prompt until the client picks a free, non-empty name
///
/// Returns `None` if the client hangs up first.
async fn handshake<R>(
    client_id: ClientId,
    lines: &mut LineReader<R>,
    sink: ClientSink,
    state: &ServerState,
) -> Result<Option<Session>, AppError>
where
    R: AsyncRead + Unpin,
{
    loop {
        sink.send_raw(NAME_PROMPT).await?;

        let Some(raw) = read_name(lines, state.handshake_timeout()).await? else {
            return Ok(None);
        };

        let Some(name) = DisplayName::parse(&raw) else {
            sink.send_raw(EMPTY_NAME).await?;
            continue;
        };

        let session = Session::new(client_id, name, sink.clone());
        match state.join(&session).await {
            Ok(()) => return Ok(Some(session)),
            Err(NameTaken(name)) => {
                debug!("Client {} asked for taken name '{}'", client_id, name);
                sink.send_raw(DUPLICATE_NAME).await?;
            }
        }
    }
}

async fn read_name<R>(
    lines: &mut LineReader<R>,
    timeout: Option<Duration>,
) -> Result<Option<String>, AppError>
where
    R: AsyncRead + Unpin,
{
    let next = match timeout {
        Some(limit) => tokio::time::timeout(limit, lines.next())
            .await
            .map_err(|_| AppError::HandshakeTimeout)?,
        None => lines.next().await,
    };
    Ok(next.transpose()?)
}

/// Broadcast every non-blank line until the connection ends
async fn message_loop<R>(
    session: &Session,
    lines: &mut LineReader<R>,
    state: &ServerState,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next().await {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        state.publish(&session.name, text).await;
    }

    info!("{} closed the connection", session.name);
    Ok(())
}
