//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::{DEFAULT_SIMULATION_TPS, DEFAULT_SNAPSHOT_TPS};
use crate::zone::phase::PhaseParseError;
use crate::zone::projector::DEFAULT_RING_SEGMENTS;
use crate::zone::{PhaseTable, ZoneSettings};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Public base URL handed to clients for the WebSocket endpoint
    pub public_base_url: String,
    /// Allowed client origins for CORS (comma separated, `*` for any)
    pub client_origin: String,

    /// Zone defaults for new sessions
    pub zone: ZoneSettings,
    /// Points per ring when projecting the boundary
    pub ring_segments: usize,

    /// Simulation ticks per second
    pub simulation_tps: u32,
    /// Snapshots broadcast per second
    pub snapshot_tps: u32,

    /// This process is the session authority and may run zones
    pub is_session_server: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let phases = match lookup("ZONE_PHASES") {
            Some(text) => PhaseTable::parse(&text)?,
            None => PhaseTable::default(),
        };

        let zone = ZoneSettings::new(
            parse_or("ZONE_INITIAL_RADIUS", &lookup, 60.0)?,
            parse_or("ZONE_RANDOMIZE_CENTER", &lookup, true)?,
            phases,
        );

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            zone,
            ring_segments: parse_or("ZONE_RING_SEGMENTS", &lookup, DEFAULT_RING_SEGMENTS)?,

            simulation_tps: parse_or("SIMULATION_TPS", &lookup, DEFAULT_SIMULATION_TPS)?,
            snapshot_tps: parse_or("SNAPSHOT_TPS", &lookup, DEFAULT_SNAPSHOT_TPS)?,

            is_session_server: parse_or("IS_SESSION_SERVER", &lookup, true)?,
        })
    }

    /// WebSocket URL derived from the public base URL
    pub fn ws_url(&self) -> String {
        format!(
            "{}/ws",
            self.public_base_url
                .trim_end_matches('/')
                .replace("https://", "wss://")
                .replace("http://", "ws://")
        )
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid ZONE_PHASES: {0}")]
    Phases(#[from] PhaseParseError),
}
