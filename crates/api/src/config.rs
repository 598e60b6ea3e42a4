use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Seconds between WebSocket Ping frames (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// How long a `complete` event is replayed to late subscribers (default: `60`).
    pub completed_state_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".into()],
            request_timeout_secs: 30,
            heartbeat_interval_secs: 30,
            completed_state_ttl_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `8000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `HEARTBEAT_INTERVAL_SECS`  | `30`                    |
    /// | `COMPLETED_STATE_TTL_SECS` | `60`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let heartbeat_interval_secs =
            parse_or(&lookup, "HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval_secs)?;
        if heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HEARTBEAT_INTERVAL_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            cors_origins,
            request_timeout_secs: parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            heartbeat_interval_secs,
            completed_state_ttl_secs: parse_or(
                &lookup,
                "COMPLETED_STATE_TTL_SECS",
                defaults.completed_state_ttl_secs,
            )?,
        })
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn completed_state_ttl(&self) -> Duration {
        Duration::from_secs(self.completed_state_ttl_secs)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.completed_state_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = ServerConfig::from_lookup(lookup(&[(
            "CORS_ORIGINS",
            "https://aidj.app, http://localhost:3000,,",
        )]))
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://aidj.app", "http://localhost:3000"]
        );
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { name: "PORT", .. });
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let err =
            ServerConfig::from_lookup(lookup(&[("HEARTBEAT_INTERVAL_SECS", "0")])).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { name: "HEARTBEAT_INTERVAL_SECS", .. });
    }
}
