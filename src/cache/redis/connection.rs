//! Lazy Redis connection.
//!
//! The connection moves through `Unconnected -> Connecting -> Connected`. A
//! one-permit semaphore admits a single caller into the handshake; callers
//! that find the state `Connected` only take a shared read of it.
//!
//! `close` bumps an epoch under the state lock. A handshake that started in an
//! earlier epoch still serves its own caller but is never installed.

use std::sync::atomic::{AtomicU64, Ordering};

use ::redis::aio::MultiplexedConnection;
use ::redis::Client;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::options::{RedisCacheOptions, ServerCommands};
use crate::error::{CacheError, Result};

// == Server Capability ==
/// Feature level resolved once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCapability {
    /// No per-field TTL commands
    Standard,
    /// Hash field expiration is available
    FieldExpiration,
}

impl ServerCapability {
    pub fn supports_field_ttl(self) -> bool {
        matches!(self, ServerCapability::FieldExpiration)
    }

    /// Capability fixed by configuration, `None` when it must be detected.
    pub fn declared(commands: ServerCommands) -> Option<Self> {
        match commands {
            ServerCommands::Six => Some(ServerCapability::Standard),
            ServerCommands::SevenTwo => Some(ServerCapability::FieldExpiration),
            ServerCommands::Auto => None,
        }
    }

    /// Derives the capability from a `redis_version` string.
    ///
    /// Hash field expiration shipped in 7.4.
    pub fn from_version(version: &str) -> Self {
        let mut parts = version.trim().split('.').map(|p| p.parse::<u32>().unwrap_or(0));
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);

        if (major, minor) >= (7, 4) {
            ServerCapability::FieldExpiration
        } else {
            ServerCapability::Standard
        }
    }

    /// Reads `redis_version` out of an `INFO server` reply.
    pub fn from_info(info: &str) -> Self {
        info.lines()
            .find_map(|line| line.strip_prefix("redis_version:"))
            .map(Self::from_version)
            .unwrap_or(ServerCapability::Standard)
    }
}

// == Connection State ==
/// An established connection and the capability negotiated with it.
#[derive(Clone)]
pub(crate) struct Connected {
    pub conn: MultiplexedConnection,
    pub capability: ServerCapability,
}

pub(crate) enum ConnectionState {
    Unconnected,
    Connecting,
    Connected(Connected),
}

// == Lazy Connection ==
pub(crate) struct LazyConnection {
    client: Client,
    commands: ServerCommands,
    state: RwLock<ConnectionState>,
    epoch: AtomicU64,
    gate: Semaphore,
}

impl LazyConnection {
    /// Parses the connection options. No network traffic happens here.
    pub fn new(options: &RedisCacheOptions) -> Result<Self> {
        let client = Client::open(options.connection_info()?)?;
        Ok(Self {
            client,
            commands: options.server_commands,
            state: RwLock::new(ConnectionState::Unconnected),
            epoch: AtomicU64::new(0),
            gate: Semaphore::new(1),
        })
    }

    /// Capability known without connecting, if configuration declares one.
    pub fn declared_capability(&self) -> Option<ServerCapability> {
        ServerCapability::declared(self.commands)
    }

    /// The established connection, if any.
    pub fn current(&self) -> Option<Connected> {
        match &*self.state.read() {
            ConnectionState::Connected(connected) => Some(connected.clone()),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    pub fn is_connecting(&self) -> bool {
        matches!(&*self.state.read(), ConnectionState::Connecting)
    }

    /// Returns the connection, performing the handshake on first use.
    pub async fn get(&self) -> Result<Connected> {
        if let Some(connected) = self.current() {
            return Ok(connected);
        }

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| CacheError::Internal("connection gate closed".to_string()))?;

        // Another caller may have finished the handshake while we waited
        if let Some(connected) = self.current() {
            return Ok(connected);
        }

        let epoch = self.begin_handshake();

        match self.establish().await {
            Ok(connected) => {
                if self.settle(epoch, Some(&connected)) {
                    info!(
                        "Redis connection established (capability: {:?})",
                        connected.capability
                    );
                } else {
                    warn!("Redis connection closed during handshake; not kept");
                }
                Ok(connected)
            }
            Err(e) => {
                warn!("Redis connection failed: {}", e);
                self.settle(epoch, None);
                Err(e)
            }
        }
    }

    /// Marks the state `Connecting` and returns the epoch the handshake
    /// belongs to.
    fn begin_handshake(&self) -> u64 {
        let mut state = self.state.write();
        *state = ConnectionState::Connecting;
        self.epoch.load(Ordering::Acquire)
    }

    /// Records the outcome of a handshake. Returns false, leaving the state
    /// untouched, when `close` ran since the handshake began.
    fn settle(&self, epoch: u64, connected: Option<&Connected>) -> bool {
        let mut state = self.state.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        *state = match connected {
            Some(connected) => ConnectionState::Connected(connected.clone()),
            None => ConnectionState::Unconnected,
        };
        true
    }

    async fn establish(&self) -> Result<Connected> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let capability = match self.declared_capability() {
            Some(capability) => capability,
            None => {
                let info: String = ::redis::cmd("INFO")
                    .arg("server")
                    .query_async(&mut conn)
                    .await?;
                ServerCapability::from_info(&info)
            }
        };

        Ok(Connected { conn, capability })
    }

    /// Drops the connection, or abandons a handshake in flight; the next
    /// call reconnects. Returns whether a connection was open or opening.
    pub fn close(&self) -> bool {
        let mut state = self.state.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let previous = std::mem::replace(&mut *state, ConnectionState::Unconnected);
        !matches!(previous, ConnectionState::Unconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_from_version() {
        assert_eq!(ServerCapability::from_version("6.2.14"), ServerCapability::Standard);
        assert_eq!(ServerCapability::from_version("7.2.4"), ServerCapability::Standard);
        assert_eq!(
            ServerCapability::from_version("7.4.0"),
            ServerCapability::FieldExpiration
        );
        assert_eq!(
            ServerCapability::from_version("8.0.1"),
            ServerCapability::FieldExpiration
        );
        assert_eq!(ServerCapability::from_version("garbage"), ServerCapability::Standard);
    }

    #[test]
    fn test_capability_from_info() {
        let info = "# Server\r\nredis_version:7.4.1\r\nredis_mode:standalone\r\n";
        assert_eq!(ServerCapability::from_info(info), ServerCapability::FieldExpiration);
        assert_eq!(ServerCapability::from_info("# Server\r\n"), ServerCapability::Standard);
    }

    #[test]
    fn test_declared_capability() {
        assert_eq!(
            ServerCapability::declared(ServerCommands::Six),
            Some(ServerCapability::Standard)
        );
        assert_eq!(
            ServerCapability::declared(ServerCommands::SevenTwo),
            Some(ServerCapability::FieldExpiration)
        );
        assert_eq!(ServerCapability::declared(ServerCommands::Auto), None);
    }

    #[test]
    fn test_new_does_not_connect() {
        let options = RedisCacheOptions::from_url("redis://127.0.0.1:1/0");
        let connection = LazyConnection::new(&options).unwrap();

        assert!(!connection.is_connected());
        assert!(!connection.is_connecting());
        assert!(!connection.close());
    }

    #[test]
    fn test_close_during_handshake_wins() {
        let options = RedisCacheOptions::from_url("redis://127.0.0.1:1/0");
        let connection = LazyConnection::new(&options).unwrap();

        let epoch = connection.begin_handshake();
        assert!(connection.is_connecting());

        assert!(connection.close());
        assert!(!connection.is_connecting());

        // The late handshake outcome must not overwrite the close
        assert!(!connection.settle(epoch, None));
        assert!(!connection.is_connecting());
        assert!(!connection.is_connected());

        // A handshake started after the close settles normally
        let epoch = connection.begin_handshake();
        assert!(connection.settle(epoch, None));
        assert!(!connection.is_connecting());
    }

    #[tokio::test]
    async fn test_failed_handshake_returns_to_unconnected() {
        // Port 1 is never a Redis server
        let options = RedisCacheOptions::from_url("redis://127.0.0.1:1/0");
        let connection = LazyConnection::new(&options).unwrap();

        assert!(connection.get().await.is_err());
        assert!(!connection.is_connected());
        assert!(!connection.is_connecting());
    }
}
