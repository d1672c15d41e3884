use crate::endpoint::{SocksCredentials, DEFAULT_SOCKS_PORTS};
use crate::error::{EndpointError, Result};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Local Tor SOCKS listener settings
    pub socks: SocksConfig,
    /// Client behaviour
    pub client: ClientConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksConfig {
    /// Ports tried in order when none is pinned (default: 9050,9150)
    pub candidate_ports: Vec<u16>,
    /// Only ever use this port
    pub pinned_port: Option<u16>,
    /// SOCKS username/password, used by Tor for stream isolation
    pub credentials: Option<SocksCredentials>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for the whole connect sequence, in seconds
    pub connect_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            socks: SocksConfig {
                candidate_ports: parse_port_list(&get_env_or(
                    "TOR_SOCKS_PORTS",
                    &default_port_list(),
                ))?,
                pinned_port: parse_optional_port("TOR_SOCKS_PORT")?,
                credentials: parse_credentials()?,
            },
            client: ClientConfig {
                connect_timeout: get_env_or("TOR_CONNECT_TIMEOUT", "30").parse().map_err(|_| {
                    EndpointError::InvalidConfig(
                        "TOR_CONNECT_TIMEOUT must be a number of seconds".into(),
                    )
                })?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.client.connect_timeout)
    }
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            candidate_ports: DEFAULT_SOCKS_PORTS.to_vec(),
            pinned_port: None,
            credentials: None,
        }
    }
}

fn default_port_list() -> String {
    DEFAULT_SOCKS_PORTS
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_port_list(raw: &str) -> Result<Vec<u16>> {
    let ports = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>().map_err(|_| {
                EndpointError::InvalidConfig(format!(
                    "TOR_SOCKS_PORTS entry '{}' is not a valid port number",
                    s
                ))
            })
        })
        .collect::<Result<Vec<u16>>>()?;

    if ports.is_empty() {
        return Err(EndpointError::InvalidConfig(
            "TOR_SOCKS_PORTS must list at least one port".into(),
        ));
    }

    Ok(ports)
}

fn parse_optional_port(key: &str) -> Result<Option<u16>> {
    let raw = env::var(key).unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse().map(Some).map_err(|_| {
        EndpointError::InvalidConfig(format!("{} must be a valid port number", key))
    })
}

fn parse_credentials() -> Result<Option<SocksCredentials>> {
    let username = env::var("TOR_SOCKS_USERNAME").ok().filter(|s| !s.is_empty());
    let password = env::var("TOR_SOCKS_PASSWORD").ok().filter(|s| !s.is_empty());

    match (username, password) {
        (None, None) => Ok(None),
        (Some(username), Some(password)) => SocksCredentials::new(username, password).map(Some),
        _ => Err(EndpointError::InvalidConfig(
            "TOR_SOCKS_USERNAME and TOR_SOCKS_PASSWORD must be set together".into(),
        )),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "TOR_SOCKS_PORTS",
        "TOR_SOCKS_PORT",
        "TOR_SOCKS_USERNAME",
        "TOR_SOCKS_PASSWORD",
        "TOR_CONNECT_TIMEOUT",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.socks, SocksConfig::default());
        assert_eq!(config.socks.candidate_ports, vec![9050, 9150]);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "pretty");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("TOR_SOCKS_PORTS", "9150, 9050 ,1984");
        env::set_var("TOR_SOCKS_PORT", "6669");
        env::set_var("TOR_SOCKS_USERNAME", "circuit-a");
        env::set_var("TOR_SOCKS_PASSWORD", "secret");
        env::set_var("TOR_CONNECT_TIMEOUT", "5");
        env::set_var("LOG_FORMAT", "json");

        let config = Config::from_env().unwrap();

        assert_eq!(config.socks.candidate_ports, vec![9150, 9050, 1984]);
        assert_eq!(config.socks.pinned_port, Some(6669));
        assert_eq!(
            config.socks.credentials,
            Some(SocksCredentials::new("circuit-a", "secret").unwrap())
        );
        assert_eq!(config.client.connect_timeout, 5);
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_config_from_env_invalid_ports() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("TOR_SOCKS_PORTS", "9050,not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, EndpointError::InvalidConfig(_)));

        env::set_var("TOR_SOCKS_PORTS", " , ");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, EndpointError::InvalidConfig(_)));

        env::remove_var("TOR_SOCKS_PORTS");
        env::set_var("TOR_SOCKS_PORT", "70000");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, EndpointError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_partial_credentials() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("TOR_SOCKS_USERNAME", "circuit-a");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, EndpointError::InvalidConfig(_)));
    }

    #[test]
    fn test_socks_config_applies_to_builder() {
        let config = SocksConfig {
            candidate_ports: vec![1984, 9150],
            pinned_port: None,
            credentials: None,
        };
        let endpoint = crate::TorClientEndpoint::builder()
            .host("example.com")
            .port(80)
            .socks_config(&config)
            .build()
            .unwrap();
        assert_eq!(
            endpoint.socks_ports(),
            &crate::endpoint::SocksPorts::Candidates(vec![1984, 9150])
        );
    }
}
