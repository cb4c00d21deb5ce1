//! Line-oriented TCP Chat Server Library
//!
//! Clients connect over plain TCP, pick a unique display name, receive the
//! chat history and then exchange newline-terminated text messages.
//!
//! # Features
//! - Admission ceiling on concurrent connections
//! - Unique, non-empty display names
//! - Full history replay on join
//! - Join/leave notices and timestamped chat lines
//!
//! # Architecture
//! Shared state behind locks, one task per connection:
//! - `ServerState` holds the client registry, the history and the admission semaphore
//! - `ChatServer` owns the listener and spawns a `handler` task per admitted connection
//! - All fan-outs go through one broadcast gate, so every client sees lines in history order
//!
//! # Example
//! ```ignore
//! use tcp_chat::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ChatServer::listen(ServerConfig::default()).await.unwrap();
//!     server.start().await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod history;
pub mod message;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{ClientSink, Session};
pub use config::ServerConfig;
pub use error::{AppError, NameTaken, SendError};
pub use handler::handle_connection;
pub use history::History;
pub use message::{Clock, FixedClock, SystemClock};
pub use registry::Registry;
pub use server::{ChatServer, ServerState};
pub use types::{ClientId, DisplayName};
