//! TCP Chat Server - Entry Point
//!
//! Parses the optional port argument, binds the listener and runs the
//! accept loop until Ctrl-C.

use std::env;
use std::process;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tcp_chat::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=tcp_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tcp_chat=info")),
        )
        .init();

    let config = match ServerConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let server = match ChatServer::listen(config).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("Error starting server: {}", e);
            process::exit(1);
        }
    };

    let closer = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            closer.close().await;
        }
    });

    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
