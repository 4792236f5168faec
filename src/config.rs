//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;

use crate::cache::{CacheOptions, ConnectionParams, RedisCacheOptions, ServerCommands};

/// Which cache backend the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Redis,
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache backend
    pub backend: BackendKind,
    /// Redis connection and namespacing options
    pub redis: RedisCacheOptions,
    /// Expiration applied to writes that do not specify one
    pub default_entry: CacheOptions,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_URL` - Redis connection string
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_USERNAME`, `REDIS_PASSWORD`, `REDIS_DB`,
    ///   `REDIS_TLS` - structured connection, used when `REDIS_HOST` is set
    /// - `CACHE_INSTANCE_NAME` - key prefix (default: empty)
    /// - `REDIS_SERVER_COMMANDS` - `six`, `seven_two` or `auto` (default: six)
    /// - `CACHE_SLIDING_MINUTES` - default sliding window (default: 30)
    /// - `CACHE_ABSOLUTE_HOURS` - default absolute lifetime (default: 1)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend = match env::var("CACHE_BACKEND").ok().as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("redis") => BackendKind::Redis,
            _ => BackendKind::Memory,
        };

        let connection = env::var("REDIS_HOST").ok().map(|host| ConnectionParams {
            host,
            port: parse_var("REDIS_PORT").unwrap_or(6379),
            username: env::var("REDIS_USERNAME").ok(),
            password: env::var("REDIS_PASSWORD").ok(),
            db: parse_var("REDIS_DB").unwrap_or(0),
            tls: parse_var("REDIS_TLS").unwrap_or(false),
        });

        let redis = RedisCacheOptions {
            configuration: env::var("REDIS_URL").ok().or(defaults.redis.configuration),
            connection,
            instance_name: env::var("CACHE_INSTANCE_NAME").unwrap_or_default(),
            server_commands: env::var("REDIS_SERVER_COMMANDS")
                .ok()
                .and_then(|v| ServerCommands::parse(&v))
                .unwrap_or_default(),
        };

        Self {
            backend,
            redis,
            default_entry: CacheOptions {
                sliding_window_minutes: parse_var("CACHE_SLIDING_MINUTES")
                    .unwrap_or(defaults.default_entry.sliding_window_minutes),
                absolute_expiration_hours: parse_var("CACHE_ABSOLUTE_HOURS")
                    .unwrap_or(defaults.default_entry.absolute_expiration_hours),
            },
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            redis: RedisCacheOptions::from_url("redis://127.0.0.1:6379"),
            default_entry: CacheOptions::default(),
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.redis.server_commands, ServerCommands::Six);
        assert_eq!(config.default_entry.sliding_window_minutes, 30);
        assert_eq!(config.default_entry.absolute_expiration_hours, 1);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "CACHE_BACKEND",
            "REDIS_URL",
            "REDIS_HOST",
            "CACHE_INSTANCE_NAME",
            "REDIS_SERVER_COMMANDS",
            "CACHE_SLIDING_MINUTES",
            "CACHE_ABSOLUTE_HOURS",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(
            config.redis.configuration.as_deref(),
            Some("redis://127.0.0.1:6379")
        );
        let info = config.redis.connection_info().unwrap();
        assert!(matches!(
            &info.addr,
            redis::ConnectionAddr::Tcp(host, 6379) if host == "127.0.0.1"
        ));
        assert!(config.redis.instance_name.is_empty());
        assert_eq!(config.server_port, 3000);
    }
}
