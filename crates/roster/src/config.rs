//! Registry Configuration
//!
//! Centralized configuration for the store connection, key namespace and lease
//! timing, with environment variable overrides.

use crate::error::ConfigError;
use roster_core::DEFAULT_NAMESPACE;
use std::time::Duration;

/// Default Redis port
pub const DEFAULT_PORT: u16 = 6379;

/// Environment variable selecting the interface used for local hostname resolution
pub const INTERFACE_ENV: &str = "REGISTRY_INTERFACE";

/// Registry configuration with sensible defaults
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Store host (env: REGISTRY_HOST). Required.
    pub host: String,

    /// Store port (env: REGISTRY_PORT)
    pub port: u16,

    /// Key namespace (env: REGISTRY_NAMESPACE), normalized by `KeySpace`
    pub namespace: String,

    /// Connection options passed through to the store client
    pub options: ConnectionOptions,

    /// Network interface for resolving the local hostname (env: REGISTRY_INTERFACE)
    pub interface: Option<String>,

    /// Lease timing
    pub lease: LeaseConfig,

    /// Retry policy for establishing the store connection
    pub connect_backoff: ConnectBackoff,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
            options: ConnectionOptions::default(),
            interface: None,
            lease: LeaseConfig::default(),
            connect_backoff: ConnectBackoff::default(),
        }
    }
}

impl RegistryConfig {
    /// Configuration for a store at `host` with every other field defaulted
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("REGISTRY_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("REGISTRY_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.port = parsed;
            }
        }

        if let Ok(namespace) = std::env::var("REGISTRY_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(db) = std::env::var("REGISTRY_DB") {
            if let Ok(parsed) = db.parse::<i64>() {
                config.options.db = parsed;
            }
        }

        config.options.username = std::env::var("REGISTRY_USERNAME").ok();
        config.options.password = std::env::var("REGISTRY_PASSWORD").ok();
        config.interface = std::env::var(INTERFACE_ENV).ok().filter(|s| !s.is_empty());

        config
    }

    /// Reject configurations the registry cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost);
        }
        self.lease.validate()
    }
}

/// Options handed to the store client verbatim
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    /// Logical database index
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Lease timing. The renew interval must stay below the TTL so a live
/// instance never expires between two successful renewals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// Expiry set on the key with every write
    pub ttl: Duration,
    /// Wait after a successful renewal
    pub renew_interval: Duration,
    /// Wait after a failed renewal
    pub backoff_interval: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            renew_interval: Duration::from_secs(5),
            backoff_interval: Duration::from_secs(15),
        }
    }
}

impl LeaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl < Duration::from_secs(1) || self.renew_interval >= self.ttl {
            return Err(ConfigError::InvalidLease {
                ttl: self.ttl,
                renew_interval: self.renew_interval,
            });
        }
        Ok(())
    }
}

/// Exponential backoff settings for the initial store connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_elapsed: Duration,
    pub multiplier: f64,
}

impl Default for ConnectBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::new("redis-host");
        assert_eq!(config.port, 6379);
        assert_eq!(config.namespace, "rr");
        assert_eq!(config.lease.ttl, Duration::from_secs(10));
        assert_eq!(config.lease.renew_interval, Duration::from_secs(5));
        assert_eq!(config.lease.backoff_interval, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let config = RegistryConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHost)));

        let config = RegistryConfig::new("   ");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHost)));
    }

    #[test]
    fn test_renew_must_precede_expiry() {
        let mut config = RegistryConfig::new("redis-host");
        config.lease.renew_interval = config.lease.ttl;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLease { .. })
        ));

        config.lease.ttl = Duration::from_millis(500);
        config.lease.renew_interval = Duration::from_millis(100);
        assert!(config.validate().is_err());
    }
}
