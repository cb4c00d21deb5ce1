//! ChatServer implementation
//!
//! `ServerState` is the shared state every connection task receives through an
//! `Arc`: the client registry, the chat history and the admission gate.
//! `ChatServer` owns the listening socket and runs the accept loop.
//!
//! Lock order: `broadcast_gate` → `registry` → `history`. The admission
//! semaphore is never touched while any of these is held.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::Session;
use crate::config::ServerConfig;
use crate::error::{AppError, NameTaken};
use crate::handler::handle_connection;
use crate::history::History;
use crate::message::{format_chat_line, Clock, ServerNotice, SystemClock};
use crate::registry::Registry;
use crate::types::{ClientId, DisplayName};

/// State shared by all connection handlers
pub struct ServerState {
    /// Online sessions and used names
    registry: RwLock<Registry>,
    /// Broadcast chat lines
    history: RwLock<History>,
    /// Serializes fan-outs so no two broadcasts interleave on a client
    broadcast_gate: Mutex<()>,
    /// Admission slots; one permit per live connection
    admission: Arc<Semaphore>,
    max_connections: usize,
    handshake_timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl ServerState {
    pub fn new(config: &ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            history: RwLock::new(History::new()),
            broadcast_gate: Mutex::new(()),
            admission: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            handshake_timeout: config.handshake_timeout,
            clock,
        }
    }

    /// Take an admission slot if one is free
    ///
    /// The slot is returned when the permit is dropped, including when the
    /// owning task panics.
    pub fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.admission).try_acquire_owned().ok()
    }

    /// Number of admitted connections still running
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.admission.available_permits()
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout
    }

    /// Register a session, announce it and replay history to it
    ///
    /// The name check and the registration happen under one write lock.
    /// The whole join runs inside the broadcast gate, so the new client
    /// receives the complete history before any live line.
    pub async fn join(&self, session: &Session) -> Result<(), NameTaken> {
        let _gate = self.broadcast_gate.lock().await;

        self.registry.write().await.join(session.clone())?;
        info!("{} joined the chat ({})", session.name, session.id);

        let notice = ServerNotice::Joined(session.name.as_str()).to_string();
        {
            let registry = self.registry.read().await;
            fan_out(&registry, &notice, Some(session.id)).await;
        }

        let history = self.history.read().await;
        for line in history.lines() {
            if let Err(e) = session.send(line).await {
                warn!("History replay to {} failed: {}", session.name, e);
                break;
            }
        }

        Ok(())
    }

    /// Remove a session, release its name and tell everyone else
    pub async fn leave(&self, id: ClientId) -> Option<Session> {
        let _gate = self.broadcast_gate.lock().await;

        let session = self.registry.write().await.leave(id)?;
        info!("{} left the chat ({})", session.name, session.id);

        let notice = ServerNotice::Left(session.name.as_str()).to_string();
        let registry = self.registry.read().await;
        fan_out(&registry, &notice, None).await;

        Some(session)
    }

    /// Deliver one line to every registered client
    pub async fn broadcast(&self, line: &str) {
        let _gate = self.broadcast_gate.lock().await;
        let registry = self.registry.read().await;
        fan_out(&registry, line, None).await;
    }

    /// Format, broadcast and record one chat message
    ///
    /// Returns the formatted line.
    pub async fn publish(&self, name: &DisplayName, text: &str) -> String {
        let _gate = self.broadcast_gate.lock().await;
        let line = format_chat_line(self.clock.now(), name.as_str(), text);

        {
            let registry = self.registry.read().await;
            fan_out(&registry, &line, None).await;
        }
        self.history.write().await.append(line.clone());

        line
    }

    /// Sorted names of online clients
    pub async fn online_names(&self) -> Vec<String> {
        self.registry.read().await.names()
    }

    /// Copy of the chat history
    pub async fn history(&self) -> Vec<String> {
        self.history.read().await.lines().to_vec()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

/// Best-effort delivery to every session except `skip`
async fn fan_out(registry: &Registry, line: &str, skip: Option<ClientId>) {
    for session in registry.sessions() {
        if Some(session.id) == skip {
            continue;
        }
        if let Err(e) = session.send(line).await {
            warn!("Delivery to {} failed: {}", session.name, e);
        }
    }
}

/// The TCP chat server
///
/// Created bound by [`ChatServer::listen`]; [`ChatServer::start`] runs the
/// accept loop until [`ChatServer::close`] is called.
pub struct ChatServer {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
}

impl ChatServer {
    /// Bind the configured address using the system clock
    pub async fn listen(config: ServerConfig) -> Result<Self, AppError> {
        Self::listen_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Bind the configured address with a custom timestamp source
    pub async fn listen_with_clock(
        config: ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let addr = config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            state: Arc::new(ServerState::new(&config, clock)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Run the accept loop until `close` is called
    ///
    /// Each admitted connection gets its own task; the loop never waits on one.
    pub async fn start(&self) -> Result<(), AppError> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or(AppError::NotListening)?;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Accept loop stopped");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }

        Ok(())
    }

    /// Spawn a handler or turn the connection away if the server is full
    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        let Some(permit) = self.state.try_admit() else {
            warn!(
                "Rejected connection from {}: too many active connections",
                peer
            );
            drop(stream);
            return;
        };

        debug!(
            "Accepted connection from {} ({} active)",
            peer,
            self.state.active_connections()
        );

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, state).await {
                debug!("Connection from {} ended: {}", peer, e);
            }
        });
    }

    /// Stop accepting and release the listening socket
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn close(&self) {
        self.shutdown.cancel();
        if self.listener.lock().await.take().is_some() {
            info!("Listener on {} closed", self.local_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientSink;
    use crate::message::FixedClock;
    use chrono::NaiveDate;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    fn test_state(max_connections: usize) -> ServerState {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let config = ServerConfig::default().with_max_connections(max_connections);
        ServerState::new(&config, Arc::new(FixedClock::new(at)))
    }

    fn session(name: &str) -> (Session, BufReader<DuplexStream>) {
        let (local, remote) = tokio::io::duplex(4096);
        let session = Session::new(
            ClientId::new(),
            DisplayName::parse(name).unwrap(),
            ClientSink::new(local),
        );
        (session, BufReader::new(remote))
    }

    async fn read_line(reader: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_join_rejects_taken_name() {
        let state = test_state(10);
        let (alice, _alice_rx) = session("alice");
        let (impostor, _impostor_rx) = session("alice");

        state.join(&alice).await.unwrap();
        let err = state.join(&impostor).await.unwrap_err();

        assert_eq!(err, NameTaken("alice".to_string()));
        assert_eq!(state.online_names().await, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_join_announces_to_others_only() {
        let state = test_state(10);
        let (alice, mut alice_rx) = session("alice");
        let (bob, _bob_rx) = session("bob");

        state.join(&alice).await.unwrap();
        state.join(&bob).await.unwrap();
        state.publish(&alice.name, "ping").await;

        assert_eq!(read_line(&mut alice_rx).await, "[Server] bob joined the chat\n");
        assert_eq!(
            read_line(&mut alice_rx).await,
            "[2024-01-02 03:04:05][alice]: ping\n"
        );
    }

    #[tokio::test]
    async fn test_publish_appends_history_in_order() {
        let state = test_state(10);
        let (alice, mut alice_rx) = session("alice");
        state.join(&alice).await.unwrap();

        let first = state.publish(&alice.name, "one").await;
        let second = state.publish(&alice.name, "two").await;

        assert_eq!(state.history().await, vec![first.clone(), second.clone()]);
        assert_eq!(read_line(&mut alice_rx).await, format!("{}\n", first));
        assert_eq!(read_line(&mut alice_rx).await, format!("{}\n", second));
    }

    #[tokio::test]
    async fn test_late_joiner_gets_history_replay() {
        let state = test_state(10);
        let (alice, _alice_rx) = session("alice");
        state.join(&alice).await.unwrap();
        state.publish(&alice.name, "one").await;
        state.publish(&alice.name, "two").await;

        let (bob, mut bob_rx) = session("bob");
        state.join(&bob).await.unwrap();
        state.publish(&alice.name, "three").await;

        assert_eq!(read_line(&mut bob_rx).await, "[2024-01-02 03:04:05][alice]: one\n");
        assert_eq!(read_line(&mut bob_rx).await, "[2024-01-02 03:04:05][alice]: two\n");
        assert_eq!(read_line(&mut bob_rx).await, "[2024-01-02 03:04:05][alice]: three\n");
    }

    #[tokio::test]
    async fn test_leave_releases_name_and_notifies() {
        let state = test_state(10);
        let (alice, _alice_rx) = session("alice");
        let (bob, mut bob_rx) = session("bob");
        state.join(&alice).await.unwrap();
        state.join(&bob).await.unwrap();

        let removed = state.leave(alice.id).await.unwrap();

        assert_eq!(removed.name.as_str(), "alice");
        assert_eq!(state.online_names().await, vec!["bob"]);
        assert_eq!(read_line(&mut bob_rx).await, "[Server] alice left the chat\n");
        assert!(state.leave(alice.id).await.is_none());

        let (again, _again_rx) = session("alice");
        assert!(state.join(&again).await.is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_skips_broken_client() {
        let state = test_state(10);
        let (alice, alice_rx) = session("alice");
        let (bob, mut bob_rx) = session("bob");
        state.join(&alice).await.unwrap();
        state.join(&bob).await.unwrap();
        drop(alice_rx);

        state.broadcast("still here").await;
        let line = state.publish(&bob.name, "hello").await;

        assert_eq!(read_line(&mut bob_rx).await, "still here\n");
        assert_eq!(read_line(&mut bob_rx).await, format!("{}\n", line));
        assert_eq!(state.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_admission_ceiling() {
        let state = test_state(2);

        let first = state.try_admit().unwrap();
        let _second = state.try_admit().unwrap();
        assert!(state.try_admit().is_none());
        assert_eq!(state.active_connections(), 2);

        drop(first);
        assert_eq!(state.active_connections(), 1);
        assert!(state.try_admit().is_some());
    }

    #[tokio::test]
    async fn test_start_after_close_fails() {
        let config = ServerConfig::default().with_host("127.0.0.1").with_port(0);
        let server = ChatServer::listen(config).await.unwrap();

        server.close().await;

        assert!(matches!(server.start().await, Err(AppError::NotListening)));
    }

    #[tokio::test]
    async fn test_bind_error() {
        let config = ServerConfig::default().with_host("127.0.0.1").with_port(0);
        let first = ChatServer::listen(config).await.unwrap();
        let taken = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(first.local_addr().port());

        let result = ChatServer::listen(taken).await;

        assert!(matches!(result, Err(AppError::Bind { .. })));
    }
}
