//! Server configuration
//!
//! Bind target, admission ceiling and the optional handshake timeout,
//! plus the positional-port rule used by the binary.

use std::time::Duration;

use crate::error::AppError;

/// Default bind host
pub const DEFAULT_HOST: &str = "localhost";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8989;

/// Maximum number of simultaneously admitted connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Runtime configuration for a [`ChatServer`](crate::ChatServer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Admission ceiling; connections beyond it are closed on accept
    pub max_connections: usize,
    /// Deadline for each name prompt; `None` waits forever
    pub handshake_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            handshake_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Build a config from the process arguments (program name excluded)
    ///
    /// Accepts zero or one positional argument, a decimal port number.
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        match args.as_slice() {
            [] => Ok(Self::default()),
            [port] => {
                let port = port.parse::<u16>().map_err(|_| AppError::Usage)?;
                Ok(Self::default().with_port(port))
            }
            _ => Err(AppError::Usage),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// `host:port` string used for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "localhost:8989");
        assert_eq!(config.max_connections, 10);
        assert!(config.handshake_timeout.is_none());
    }

    #[test]
    fn test_from_args_without_port() {
        let config = ServerConfig::from_args(args(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_from_args_with_port() {
        let config = ServerConfig::from_args(args(&["2525"])).unwrap();
        assert_eq!(config.addr(), "localhost:2525");
    }

    #[test]
    fn test_from_args_rejects_non_numeric() {
        assert!(matches!(
            ServerConfig::from_args(args(&["abc"])),
            Err(AppError::Usage)
        ));
        assert!(matches!(
            ServerConfig::from_args(args(&["70000"])),
            Err(AppError::Usage)
        ));
    }

    #[test]
    fn test_from_args_rejects_extra_arguments() {
        assert!(matches!(
            ServerConfig::from_args(args(&["8080", "9090"])),
            Err(AppError::Usage)
        ));
    }

    #[test]
    fn test_builders() {
        let config = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(0)
            .with_max_connections(2)
            .with_handshake_timeout(Duration::from_secs(5));
        assert_eq!(config.addr(), "127.0.0.1:0");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(5)));
    }
}
