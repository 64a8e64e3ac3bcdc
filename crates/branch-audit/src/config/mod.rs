use chrono::Duration;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the audit service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    /// Retry policy for device-side sync queues such as the `demo` command's.
    /// `serve` loads it but never queues writes itself.
    pub sync: SyncConfig,
    pub incident_log_capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            max_attempts: read_number("SYNC_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_base_secs: read_number("SYNC_BACKOFF_BASE_SECS", defaults.backoff_base_secs)?,
            backoff_max_secs: read_number("SYNC_BACKOFF_MAX_SECS", defaults.backoff_max_secs)?,
        };
        if sync.max_attempts == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "SYNC_MAX_ATTEMPTS",
            });
        }
        if sync.backoff_base_secs > MAX_BACKOFF_SECS {
            return Err(ConfigError::InvalidNumber {
                key: "SYNC_BACKOFF_BASE_SECS",
            });
        }
        if sync.backoff_max_secs > MAX_BACKOFF_SECS {
            return Err(ConfigError::InvalidNumber {
                key: "SYNC_BACKOFF_MAX_SECS",
            });
        }

        let incident_log_capacity =
            read_number("INCIDENT_LOG_CAPACITY", DEFAULT_INCIDENT_LOG_CAPACITY)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            sync,
            incident_log_capacity,
        })
    }
}

pub const DEFAULT_INCIDENT_LOG_CAPACITY: usize = 50;

/// Longest retry delay the sync queue will schedule, in seconds (30 days).
pub const MAX_BACKOFF_SECS: u64 = 30 * 24 * 60 * 60;

fn read_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Retry policy for the offline sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
}

impl SyncConfig {
    /// Delay before the next attempt after `attempts` consecutive failures.
    pub fn backoff_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(32);
        let delay = self
            .backoff_base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_secs)
            .min(MAX_BACKOFF_SECS);
        Duration::seconds(i64::try_from(delay).unwrap_or(i64::MAX))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_secs: 30,
            backoff_max_secs: 3_600,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "SYNC_MAX_ATTEMPTS",
            "SYNC_BACKOFF_BASE_SECS",
            "SYNC_BACKOFF_MAX_SECS",
            "INCIDENT_LOG_CAPACITY",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.incident_log_capacity, DEFAULT_INCIDENT_LOG_CAPACITY);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_zero_sync_attempts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SYNC_MAX_ATTEMPTS", "0");
        let err = AppConfig::load().expect_err("zero attempts rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "SYNC_MAX_ATTEMPTS"
            }
        ));
        reset_env();
    }

    #[test]
    fn rejects_backoff_beyond_the_retry_ceiling() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SYNC_BACKOFF_MAX_SECS", u64::MAX.to_string());
        let err = AppConfig::load().expect_err("huge backoff rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "SYNC_BACKOFF_MAX_SECS"
            }
        ));

        reset_env();
        env::set_var("SYNC_BACKOFF_BASE_SECS", "9000000000000000");
        let err = AppConfig::load().expect_err("huge base rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "SYNC_BACKOFF_BASE_SECS"
            }
        ));
        reset_env();
    }

    #[test]
    fn backoff_never_exceeds_the_retry_ceiling() {
        let config = SyncConfig {
            max_attempts: 5,
            backoff_base_secs: 9_000_000_000_000_000,
            backoff_max_secs: u64::MAX,
        };
        assert_eq!(
            config.backoff_after(3),
            Duration::seconds(MAX_BACKOFF_SECS as i64)
        );
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let config = SyncConfig {
            max_attempts: 5,
            backoff_base_secs: 30,
            backoff_max_secs: 100,
        };
        assert_eq!(config.backoff_after(1), Duration::seconds(30));
        assert_eq!(config.backoff_after(2), Duration::seconds(60));
        assert_eq!(config.backoff_after(3), Duration::seconds(100));
        assert_eq!(config.backoff_after(40), Duration::seconds(100));
    }
}
