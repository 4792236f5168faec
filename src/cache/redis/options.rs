//! Redis backend configuration.

use ::redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Server Commands ==
/// Command level the Redis server is declared to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerCommands {
    /// Redis 6.x command set, no per-field TTL
    #[default]
    Six,
    /// Servers with hash field expiration (`HPEXPIRE`)
    SevenTwo,
    /// Ask the server for its version when connecting
    Auto,
}

impl ServerCommands {
    /// Parses the configuration spelling (`six`, `seven_two`, `auto`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "six" | "6" => Some(Self::Six),
            "seven_two" | "seventwo" | "7.2" => Some(Self::SevenTwo),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

// == Connection Parameters ==
/// Structured alternative to a connection string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub tls: bool,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            tls: false,
        }
    }
}

impl ConnectionParams {
    /// Client connection info. Credentials are passed as-is, never through a URL.
    pub fn to_connection_info(&self) -> ConnectionInfo {
        let addr = if self.tls {
            ConnectionAddr::TcpTls {
                host: self.host.clone(),
                port: self.port,
                insecure: false,
                tls_params: None,
            }
        } else {
            ConnectionAddr::Tcp(self.host.clone(), self.port)
        };
        ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                db: self.db,
                username: self.username.clone(),
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

// == Redis Cache Options ==
/// Options consumed by [`RedisCache`](super::RedisCache).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisCacheOptions {
    /// Connection string such as `redis://localhost:6379/0`
    pub configuration: Option<String>,
    /// Structured parameters, preferred over `configuration` when both are set
    pub connection: Option<ConnectionParams>,
    /// Prefix prepended to every key
    pub instance_name: String,
    /// Declared command level of the server
    pub server_commands: ServerCommands,
}

impl RedisCacheOptions {
    /// Options for a connection string with no prefix.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            configuration: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_instance_name(mut self, instance: impl Into<String>) -> Self {
        self.instance_name = instance.into();
        self
    }

    pub fn with_server_commands(mut self, commands: ServerCommands) -> Self {
        self.server_commands = commands;
        self
    }

    /// Resolves the connection info handed to the Redis client.
    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        if let Some(params) = &self.connection {
            return Ok(params.to_connection_info());
        }
        match self.configuration.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url.trim().into_connection_info()?),
            _ => Err(CacheError::InvalidArgument(
                "either a Redis connection string or connection parameters are required"
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_target(info: &ConnectionInfo) -> Option<(&str, u16)> {
        match &info.addr {
            ConnectionAddr::Tcp(host, port) => Some((host.as_str(), *port)),
            _ => None,
        }
    }

    #[test]
    fn test_params_connection_info() {
        let params = ConnectionParams {
            password: Some("secret".to_string()),
            db: 2,
            ..ConnectionParams::default()
        };
        let info = params.to_connection_info();
        assert_eq!(tcp_target(&info), Some(("127.0.0.1", 6379)));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.username, None);
        assert_eq!(info.redis.password.as_deref(), Some("secret"));

        let params = ConnectionParams {
            host: "cache.internal".to_string(),
            username: Some("app".to_string()),
            tls: true,
            ..ConnectionParams::default()
        };
        let info = params.to_connection_info();
        assert!(matches!(
            &info.addr,
            ConnectionAddr::TcpTls { host, port: 6379, insecure: false, .. } if host == "cache.internal"
        ));
        assert_eq!(info.redis.username.as_deref(), Some("app"));
    }

    #[test]
    fn test_reserved_characters_in_credentials_preserved() {
        let params = ConnectionParams {
            username: Some("svc@team".to_string()),
            password: Some("p/ss#1@x?y:z%".to_string()),
            db: 3,
            ..ConnectionParams::default()
        };
        let options = RedisCacheOptions {
            connection: Some(params),
            ..RedisCacheOptions::default()
        };

        let info = options.connection_info().unwrap();
        assert_eq!(tcp_target(&info), Some(("127.0.0.1", 6379)));
        assert_eq!(info.redis.db, 3);
        assert_eq!(info.redis.username.as_deref(), Some("svc@team"));
        assert_eq!(info.redis.password.as_deref(), Some("p/ss#1@x?y:z%"));

        assert!(::redis::Client::open(info).is_ok());
    }

    #[test]
    fn test_params_preferred_over_string() {
        let options = RedisCacheOptions {
            configuration: Some("redis://ignored:1".to_string()),
            connection: Some(ConnectionParams::default()),
            ..RedisCacheOptions::default()
        };
        let info = options.connection_info().unwrap();
        assert_eq!(tcp_target(&info), Some(("127.0.0.1", 6379)));
    }

    #[test]
    fn test_connection_string_parsed() {
        let info = RedisCacheOptions::from_url(" redis://:pw@cache.internal:6380/4 ")
            .connection_info()
            .unwrap();
        assert_eq!(tcp_target(&info), Some(("cache.internal", 6380)));
        assert_eq!(info.redis.db, 4);
        assert_eq!(info.redis.password.as_deref(), Some("pw"));

        let result = RedisCacheOptions::from_url("not a url").connection_info();
        assert!(matches!(result, Err(CacheError::Redis(_))));
    }

    #[test]
    fn test_missing_connection_rejected() {
        let result = RedisCacheOptions::default().connection_info();
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn test_server_commands_parse() {
        assert_eq!(ServerCommands::parse("six"), Some(ServerCommands::Six));
        assert_eq!(ServerCommands::parse("SEVEN_TWO"), Some(ServerCommands::SevenTwo));
        assert_eq!(ServerCommands::parse("auto"), Some(ServerCommands::Auto));
        assert_eq!(ServerCommands::parse("eight"), None);
    }
}
