//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::SessionSettings;

/// Supabase connection, present only when both variables are set
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret for bearer token verification
    pub jwt_secret: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// Match persistence; in-memory when absent
    pub supabase: Option<SupabaseConfig>,

    /// How long a finished match stays live before its session exits
    pub match_retention: Duration,
    /// How often playing matches are checked for an expired clock
    pub clock_sweep_interval: Duration,
    /// Inbound command queue depth per match
    pub command_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let supabase = match (lookup("SUPABASE_URL"), lookup("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (None, None) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            jwt_secret: lookup("AUTH_JWT_SECRET").ok_or(ConfigError::Missing("AUTH_JWT_SECRET"))?,
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),

            supabase,

            match_retention: Duration::from_secs(parse_or(
                &lookup,
                "MATCH_RETENTION_SECS",
                300u64,
            )?),
            clock_sweep_interval: Duration::from_millis(
                parse_or(&lookup, "CLOCK_SWEEP_MS", 1000u64)?.max(1),
            ),
            command_queue_capacity: parse_or(&lookup, "COMMAND_QUEUE_CAPACITY", 64usize)?
                .max(1),
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            command_capacity: self.command_queue_capacity,
            retention: self.match_retention,
            ..SessionSettings::default()
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_secret() {
        let config = load(&[("AUTH_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.server_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.log_level, "info");
        assert!(config.supabase.is_none());
        assert_eq!(config.match_retention, Duration::from_secs(300));
        assert_eq!(config.clock_sweep_interval, Duration::from_millis(1000));
        assert_eq!(config.session_settings().command_capacity, 64);
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = load(&[
            ("AUTH_JWT_SECRET", "s"),
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1"),
        ])
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::Missing("AUTH_JWT_SECRET"))
        ));
    }

    #[test]
    fn supabase_needs_both_halves() {
        let half = load(&[("AUTH_JWT_SECRET", "s"), ("SUPABASE_URL", "https://x")]);
        assert!(matches!(
            half,
            Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))
        ));

        let full = load(&[
            ("AUTH_JWT_SECRET", "s"),
            ("SUPABASE_URL", "https://x"),
            ("SUPABASE_SERVICE_ROLE_KEY", "k"),
        ])
        .unwrap();
        assert_eq!(full.supabase.unwrap().url, "https://x");
    }

    #[test]
    fn bad_number_is_reported() {
        let err = load(&[("AUTH_JWT_SECRET", "s"), ("CLOCK_SWEEP_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("CLOCK_SWEEP_MS", _)));
    }
}
