// config.rs
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConsoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    Polling,
}

impl FromStr for Transport {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" => Ok(Transport::WebSocket),
            "polling" => Ok(Transport::Polling),
            other => Err(ConsoleError::Config(format!("unknown transport '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub transports: Vec<Transport>,
    pub connect_timeout: Duration,
    pub force_new: bool,
    pub reconnection: bool,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub reconnection_delay_max: Duration,
    pub randomization_factor: f64,
    pub ping_interval: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transports: vec![Transport::WebSocket, Transport::Polling],
            connect_timeout: Duration::from_millis(20_000),
            force_new: true,
            reconnection: true,
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1_000),
            reconnection_delay_max: Duration::from_millis(5_000),
            randomization_factor: 0.5,
            ping_interval: Some(Duration::from_secs(25)),
        }
    }

    /// Delay before the `attempt`-th retry (1-based), doubling from the
    /// initial delay and capped at the max, before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.reconnection_delay.saturating_mul(2_u32.pow(exponent));
        std::cmp::min(delay, self.reconnection_delay_max)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub session_file: String,
    pub admin_room: String,
    pub notice_ttl: Duration,
    pub log_level: String,
    pub connection: ConnectionConfig,
}

impl Config {
    pub fn init() -> Result<Config, ConsoleError> {
        let api_base_url = required("API_BASE_URL")?;
        let socket_url = required("SOCKET_URL")?;

        let session_file = std::env::var("SESSION_FILE")
            .unwrap_or_else(|_| ".support-console/session.json".to_string());
        let admin_room = std::env::var("ADMIN_ROOM")
            .unwrap_or_else(|_| "admin_support".to_string());
        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "debug".to_string());

        let mut connection = ConnectionConfig::new(socket_url);
        if let Ok(list) = std::env::var("SOCKET_TRANSPORTS") {
            connection.transports = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(Transport::from_str)
                .collect::<Result<Vec<_>, _>>()?;
        }
        connection.connect_timeout = millis_or("SOCKET_CONNECT_TIMEOUT_MS", connection.connect_timeout)?;
        connection.force_new = parse_or("SOCKET_FORCE_NEW", connection.force_new)?;
        connection.reconnection = parse_or("SOCKET_RECONNECTION", connection.reconnection)?;
        connection.reconnection_attempts =
            parse_or("SOCKET_RECONNECTION_ATTEMPTS", connection.reconnection_attempts)?;
        connection.reconnection_delay =
            millis_or("SOCKET_RECONNECTION_DELAY_MS", connection.reconnection_delay)?;
        connection.reconnection_delay_max =
            millis_or("SOCKET_RECONNECTION_DELAY_MAX_MS", connection.reconnection_delay_max)?;
        connection.randomization_factor =
            parse_or("SOCKET_RANDOMIZATION_FACTOR", connection.randomization_factor)?;

        // 0 disables the liveness ping
        connection.ping_interval = match parse_or("SOCKET_PING_INTERVAL_MS", 25_000u64)? {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let notice_ttl = millis_or("NOTICE_TTL_MS", Duration::from_millis(5_000))?;

        let config = Config {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            session_file,
            admin_room,
            notice_ttl,
            log_level,
            connection,
        };
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConsoleError> {
        // polling is only ever a fallback and is not implemented
        if self.connection.transports.first() != Some(&Transport::WebSocket) {
            return Err(ConsoleError::Config(
                "SOCKET_TRANSPORTS must start with websocket".to_string(),
            ));
        }
        if self.connection.reconnection_delay > self.connection.reconnection_delay_max {
            return Err(ConsoleError::Config(
                "reconnection delay exceeds its maximum".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.connection.randomization_factor) {
            return Err(ConsoleError::Config(
                "SOCKET_RANDOMIZATION_FACTOR must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn required(key: &str) -> Result<String, ConsoleError> {
    std::env::var(key).map_err(|_| ConsoleError::Config(format!("{} must be set", key)))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConsoleError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConsoleError::Config(format!("{} has an invalid value '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn millis_or(key: &str, default: Duration) -> Result<Duration, ConsoleError> {
    parse_or(key, default.as_millis() as u64).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_capped() {
        let config = ConnectionConfig::new("ws://localhost:5000");
        assert_eq!(config.base_delay(1), Duration::from_millis(1_000));
        assert_eq!(config.base_delay(2), Duration::from_millis(2_000));
        assert_eq!(config.base_delay(3), Duration::from_millis(4_000));
        assert_eq!(config.base_delay(4), Duration::from_millis(5_000));
        assert_eq!(config.base_delay(40), Duration::from_millis(5_000));
    }

    #[test]
    fn test_transport_parsing() {
        assert_eq!("websocket".parse::<Transport>().unwrap(), Transport::WebSocket);
        assert_eq!(" Polling ".parse::<Transport>().unwrap(), Transport::Polling);
        assert!("carrier-pigeon".parse::<Transport>().is_err());
    }

    #[test]
    fn test_defaults_match_console_socket_options() {
        let config = ConnectionConfig::new("ws://localhost:5000");
        assert_eq!(config.reconnection_attempts, 5);
        assert!(config.reconnection);
        assert!(config.force_new);
        assert_eq!(config.transports, vec![Transport::WebSocket, Transport::Polling]);
    }

    fn config_with(transports: Vec<Transport>) -> Config {
        let mut connection = ConnectionConfig::new("ws://localhost:5000");
        connection.transports = transports;
        Config {
            api_base_url: "http://localhost:5000/api".to_string(),
            session_file: ".support-console/session.json".to_string(),
            admin_room: "admin_support".to_string(),
            notice_ttl: Duration::from_secs(5),
            log_level: "debug".to_string(),
            connection,
        }
    }

    #[test]
    fn test_transports_must_lead_with_websocket() {
        assert!(config_with(vec![Transport::WebSocket]).validate().is_ok());
        assert!(config_with(vec![Transport::WebSocket, Transport::Polling]).validate().is_ok());
        assert!(matches!(
            config_with(vec![Transport::Polling, Transport::WebSocket]).validate(),
            Err(ConsoleError::Config(_))
        ));
        assert!(config_with(vec![Transport::Polling]).validate().is_err());
    }
}
