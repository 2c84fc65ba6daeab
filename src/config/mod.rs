use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::NaiveDate;

use crate::workflows::substitution::SchedulingPolicy;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
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

        let max_candidates = env::var("COVER_MAX_CANDIDATES")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidMaxCandidates)?;

        let expiry_lead_minutes = env::var("COVER_EXPIRY_LEAD_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidExpiryLead)?;

        let term_start = match env::var("COVER_TERM_START") {
            Ok(raw) => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|source| ConfigError::InvalidTermStart { source })?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig {
                max_candidates,
                expiry_lead_minutes,
                term_start,
            },
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the substitution workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub max_candidates: usize,
    pub expiry_lead_minutes: i64,
    pub term_start: Option<NaiveDate>,
}

impl WorkflowConfig {
    pub fn scheduling_policy(&self) -> SchedulingPolicy {
        SchedulingPolicy {
            max_candidates: self.max_candidates,
            expiry_lead_minutes: self.expiry_lead_minutes,
            term_start: self.term_start,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMaxCandidates,
    InvalidExpiryLead,
    InvalidTermStart { source: chrono::ParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMaxCandidates => {
                write!(f, "COVER_MAX_CANDIDATES must be a positive integer")
            }
            ConfigError::InvalidExpiryLead => {
                write!(f, "COVER_EXPIRY_LEAD_MINUTES must be an integer number of minutes")
            }
            ConfigError::InvalidTermStart { .. } => {
                write!(f, "COVER_TERM_START must be a YYYY-MM-DD date")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidMaxCandidates
            | ConfigError::InvalidExpiryLead => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidTermStart { source } => Some(source),
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
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("COVER_MAX_CANDIDATES");
        env::remove_var("COVER_EXPIRY_LEAD_MINUTES");
        env::remove_var("COVER_TERM_START");
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
        assert_eq!(config.workflow.max_candidates, 5);
        assert_eq!(config.workflow.expiry_lead_minutes, 0);
        assert!(config.workflow.term_start.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn workflow_knobs_parse_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("COVER_MAX_CANDIDATES", "3");
        env::set_var("COVER_EXPIRY_LEAD_MINUTES", "30");
        env::set_var("COVER_TERM_START", "2024-01-08");
        let config = AppConfig::load().expect("config loads");
        let policy = config.workflow.scheduling_policy();
        assert_eq!(policy.max_candidates, 3);
        assert_eq!(policy.expiry_lead_minutes, 30);
        assert_eq!(
            policy.term_start,
            NaiveDate::from_ymd_opt(2024, 1, 8)
        );
    }

    #[test]
    fn rejects_malformed_term_start() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("COVER_TERM_START", "next monday");
        match AppConfig::load() {
            Err(ConfigError::InvalidTermStart { .. }) => {}
            other => panic!("expected term start error, got {other:?}"),
        }
    }
}
