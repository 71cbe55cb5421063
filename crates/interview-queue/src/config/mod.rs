use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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

/// Top-level configuration for the scheduling service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduling: SchedulingDefaults,
    pub roster: RosterConfig,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let defaults = SchedulingDefaults::default();
        let scheduling = SchedulingDefaults {
            active_queue_limit: number_var("APP_ACTIVE_QUEUE_LIMIT", defaults.active_queue_limit)?,
            high_priority_quota: number_var(
                "APP_HIGH_PRIORITY_QUOTA",
                defaults.high_priority_quota,
            )?,
            average_interview_minutes: number_var(
                "APP_AVERAGE_INTERVIEW_MINUTES",
                defaults.average_interview_minutes,
            )?,
            buffer_minutes: number_var("APP_BUFFER_MINUTES", defaults.buffer_minutes)?,
            group_interview_max_size: number_var(
                "APP_GROUP_INTERVIEW_MAX_SIZE",
                defaults.group_interview_max_size,
            )?,
            high_priority_time_limit_minutes: number_var(
                "APP_HIGH_PRIORITY_TIME_LIMIT_MINUTES",
                defaults.high_priority_time_limit_minutes,
            )?,
            max_queue_length: number_var("APP_MAX_QUEUE_LENGTH", defaults.max_queue_length)?,
            activity_hours: number_var("APP_ACTIVITY_HOURS", defaults.activity_hours)?,
        };

        let roster = RosterConfig {
            users_csv: env::var("APP_ROSTER_USERS").ok().map(PathBuf::from),
            positions_csv: env::var("APP_ROSTER_POSITIONS").ok().map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            scheduling,
            roster,
        })
    }
}

fn number_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { variable: name }),
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

/// Output layout for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" | "verbose" => Self::Full,
            _ => Self::Compact,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Values the activity window starts with when the service boots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingDefaults {
    pub active_queue_limit: u32,
    pub high_priority_quota: u32,
    pub average_interview_minutes: u32,
    pub buffer_minutes: u32,
    pub group_interview_max_size: u32,
    pub high_priority_time_limit_minutes: u32,
    pub max_queue_length: u32,
    pub activity_hours: u32,
}

impl Default for SchedulingDefaults {
    fn default() -> Self {
        Self {
            active_queue_limit: 6,
            high_priority_quota: 2,
            average_interview_minutes: 8,
            buffer_minutes: 5,
            group_interview_max_size: 4,
            high_priority_time_limit_minutes: 30,
            max_queue_length: 500,
            activity_hours: 8,
        }
    }
}

/// Optional CSV files used to seed users and positions at startup.
#[derive(Debug, Clone, Default)]
pub struct RosterConfig {
    pub users_csv: Option<PathBuf>,
    pub positions_csv: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative whole number")
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
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_ACTIVE_QUEUE_LIMIT",
            "APP_HIGH_PRIORITY_QUOTA",
            "APP_AVERAGE_INTERVIEW_MINUTES",
            "APP_BUFFER_MINUTES",
            "APP_GROUP_INTERVIEW_MAX_SIZE",
            "APP_HIGH_PRIORITY_TIME_LIMIT_MINUTES",
            "APP_MAX_QUEUE_LENGTH",
            "APP_ACTIVITY_HOURS",
            "APP_ROSTER_USERS",
            "APP_ROSTER_POSITIONS",
        ] {
            env::remove_var(name);
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
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(config.scheduling, SchedulingDefaults::default());
        assert!(config.roster.users_csv.is_none());
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
    fn scheduling_overrides_are_parsed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HIGH_PRIORITY_QUOTA", "3");
        env::set_var("APP_BUFFER_MINUTES", " 2 ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.scheduling.high_priority_quota, 3);
        assert_eq!(config.scheduling.buffer_minutes, 2);
        assert_eq!(config.scheduling.average_interview_minutes, 8);
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_scheduling_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_MAX_QUEUE_LENGTH", "lots");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { variable }) => {
                assert_eq!(variable, "APP_MAX_QUEUE_LENGTH")
            }
            other => panic!("expected invalid number error, got {other:?}"),
        }
        reset_env();
    }
}
