use std::str::FromStr;
use std::time::Duration;

use crate::reconnect::ReconnectConfig;

/// Interval between keepalive pings while a connection is open.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Job channel configuration.
///
/// Defaults match the production server: 3 s reconnect delay, 25 s
/// keepalive, no connect timeout.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket base URL (default: `ws://localhost:8000`).
    pub base_url: String,
    /// Delay policy between reconnection attempts.
    pub reconnect: ReconnectConfig,
    /// How often a `"ping"` frame is sent on an open connection.
    pub ping_interval: Duration,
    /// Upper bound on the connect step. `None` leaves it to the transport.
    pub connect_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".into(),
            reconnect: ReconnectConfig::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
            connect_timeout: None,
        }
    }
}

impl ChannelConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default               |
    /// |-----------------------------|-----------------------|
    /// | `AIDJ_WS_BASE_URL`          | `ws://localhost:8000` |
    /// | `AIDJ_RECONNECT_DELAY_MS`   | `3000`                |
    /// | `AIDJ_PING_INTERVAL_SECS`   | `25`                  |
    /// | `AIDJ_CONNECT_TIMEOUT_SECS` | unset (no timeout)    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = lookup("AIDJ_WS_BASE_URL").unwrap_or(defaults.base_url);

        let reconnect = match parse_var::<u64>(&lookup, "AIDJ_RECONNECT_DELAY_MS")? {
            Some(ms) => ReconnectConfig::fixed(Duration::from_millis(ms)),
            None => defaults.reconnect,
        };

        let ping_interval = match parse_var::<u64>(&lookup, "AIDJ_PING_INTERVAL_SECS")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "AIDJ_PING_INTERVAL_SECS",
                    value: "0".into(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.ping_interval,
        };

        let connect_timeout =
            parse_var::<u64>(&lookup, "AIDJ_CONNECT_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            base_url,
            reconnect,
            ping_interval,
            connect_timeout,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError::Invalid { name, value }),
    }
}

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}
