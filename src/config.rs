//! Configuration Module
//!
//! Loads server configuration from environment variables.

use std::env;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache-wide TTL in seconds, 0 disables it
    pub default_ttl: u64,
    /// Keep the original deadline on reads instead of extending it
    pub skip_ttl_extension: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL` - Global TTL in seconds (default: 300, 0 = no expiry)
    /// - `SKIP_TTL_EXTENSION` - `true`/`1` keeps fixed deadlines (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            skip_ttl_extension: env::var("SKIP_TTL_EXTENSION")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.skip_ttl_extension),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Global TTL as a duration.
    pub fn global_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 300,
            skip_ttl_extension: false,
            server_port: 3000,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.default_ttl, 300);
        assert!(!config.skip_ttl_extension);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.global_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("DEFAULT_TTL");
        env::remove_var("SKIP_TTL_EXTENSION");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.default_ttl, 300);
        assert!(!config.skip_ttl_extension);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
