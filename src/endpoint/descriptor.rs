//! Text form of a Tor client endpoint
//!
//! `tor:host=<host>:port=<port>[:socksPort=<port>]`. Arguments are separated
//! by `:`; a backslash makes the next character literal, so an IPv6
//! destination is written `host=2001\:db8\:\:1`. `host` and `port` may also be
//! given positionally, in that order.

use std::fmt;
use std::str::FromStr;

use super::tor::TorClientEndpointBuilder;
use super::TorClientEndpoint;
use crate::config::SocksConfig;
use crate::error::{EndpointError, Result};

pub const PREFIX: &str = "tor";

/// Parsed endpoint description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socks_port: Option<u16>,
}

impl EndpointDescriptor {
    /// Builder pre-filled from this description
    ///
    /// Missing host or port are left for `build` to report.
    pub fn into_builder(self) -> TorClientEndpointBuilder {
        self.apply(TorClientEndpoint::builder())
    }

    /// Like [`into_builder`](Self::into_builder), on top of settings loaded
    /// from the environment. A `socksPort` in the description replaces any
    /// port pinned by `config`.
    pub fn into_builder_with(self, config: &SocksConfig) -> TorClientEndpointBuilder {
        self.apply(TorClientEndpoint::builder().socks_config(config))
    }

    fn apply(self, mut builder: TorClientEndpointBuilder) -> TorClientEndpointBuilder {
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(socks_port) = self.socks_port {
            builder = builder.socks_port(socks_port);
        }
        builder
    }
}

impl FromStr for EndpointDescriptor {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self> {
        let mut args = split_args(s)?.into_iter();

        match args.next() {
            Some((None, prefix)) if prefix.eq_ignore_ascii_case(PREFIX) => {}
            _ => {
                return Err(EndpointError::InvalidDescriptor(format!(
                    "'{}' does not start with '{}:'",
                    s, PREFIX
                )))
            }
        }

        let mut descriptor = EndpointDescriptor::default();
        let mut positional = 0;

        for (key, value) in args {
            let key = match key {
                Some(key) => key,
                None => {
                    positional += 1;
                    match positional {
                        1 => "host".to_string(),
                        2 => "port".to_string(),
                        _ => {
                            return Err(EndpointError::InvalidDescriptor(format!(
                                "unexpected argument '{}'",
                                value
                            )))
                        }
                    }
                }
            };

            let already_set = match key.as_str() {
                "host" => descriptor.host.replace(value).is_some(),
                "port" => descriptor.port.replace(parse_port(&key, &value)?).is_some(),
                "socksPort" => descriptor
                    .socks_port
                    .replace(parse_port(&key, &value)?)
                    .is_some(),
                other => {
                    return Err(EndpointError::InvalidDescriptor(format!(
                        "unknown argument '{}'",
                        other
                    )))
                }
            };
            if already_set {
                return Err(EndpointError::InvalidDescriptor(format!(
                    "{} given more than once",
                    key
                )));
            }
        }

        Ok(descriptor)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PREFIX)?;
        if let Some(host) = &self.host {
            write!(f, ":host={}", escape(host))?;
        }
        if let Some(port) = self.port {
            write!(f, ":port={}", port)?;
        }
        if let Some(socks_port) = self.socks_port {
            write!(f, ":socksPort={}", socks_port)?;
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value.parse().map_err(|_| {
        EndpointError::InvalidDescriptor(format!("{} must be a port number, got '{}'", key, value))
    })
}

/// Split on unescaped `:` into `(key, value)` pairs.
fn split_args(s: &str) -> Result<Vec<(Option<String>, String)>> {
    let mut args = Vec::new();
    let mut key = None;
    let mut current = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => {
                    return Err(EndpointError::InvalidDescriptor(
                        "trailing backslash".into(),
                    ))
                }
            },
            ':' => args.push((key.take(), std::mem::take(&mut current))),
            '=' if key.is_none() => key = Some(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    args.push((key, current));

    Ok(args)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ':' | '=' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{SocksCredentials, SocksPorts};

    #[test]
    fn test_parse_keyword_args() {
        let d: EndpointDescriptor = "tor:host=timaq4ygg2iegci7.onion:port=80".parse().unwrap();
        assert_eq!(d.host.as_deref(), Some("timaq4ygg2iegci7.onion"));
        assert_eq!(d.port, Some(80));
        assert_eq!(d.socks_port, None);
    }

    #[test]
    fn test_parse_socks_port() {
        let d: EndpointDescriptor = "tor:host=example.com:port=443:socksPort=9150".parse().unwrap();
        assert_eq!(d.socks_port, Some(9150));

        let endpoint = d.into_builder().build().unwrap();
        assert_eq!(endpoint.socks_ports(), &SocksPorts::Pinned(9150));
    }

    #[test]
    fn test_parse_positional_args() {
        let d: EndpointDescriptor = "TOR:example.com:8080".parse().unwrap();
        assert_eq!(d.host.as_deref(), Some("example.com"));
        assert_eq!(d.port, Some(8080));
    }

    #[test]
    fn test_parse_escaped_ipv6_host() {
        let d: EndpointDescriptor = r"tor:host=2001\:db8\:\:1:port=22".parse().unwrap();
        assert_eq!(d.host.as_deref(), Some("2001:db8::1"));
        assert_eq!(d.port, Some(22));
    }

    #[test]
    fn test_display_escapes_host() {
        let d = EndpointDescriptor {
            host: Some("::1".to_string()),
            port: Some(80),
            socks_port: Some(9050),
        };
        assert_eq!(d.to_string(), r"tor:host=\:\:1:port=80:socksPort=9050");
        assert_eq!(d.to_string().parse::<EndpointDescriptor>().unwrap(), d);
    }

    #[test]
    fn test_missing_port_is_left_to_builder() {
        let d: EndpointDescriptor = "tor:host=example.com".parse().unwrap();
        let err = d.into_builder().build().unwrap_err();
        assert!(matches!(err, EndpointError::InvalidConfig(_)));
    }

    fn env_socks_config() -> SocksConfig {
        SocksConfig {
            candidate_ports: vec![9050, 9150],
            pinned_port: Some(9050),
            credentials: Some(SocksCredentials::new("alice", "s3cret").unwrap()),
        }
    }

    #[test]
    fn test_descriptor_socks_port_beats_config() {
        let d: EndpointDescriptor = "tor:host=example.com:port=80:socksPort=9150".parse().unwrap();
        let endpoint = d.into_builder_with(&env_socks_config()).build().unwrap();
        assert_eq!(endpoint.socks_ports(), &SocksPorts::Pinned(9150));
    }

    #[test]
    fn test_config_pinned_port_used_without_socks_port() {
        let d: EndpointDescriptor = "tor:host=example.com:port=80".parse().unwrap();
        let endpoint = d.into_builder_with(&env_socks_config()).build().unwrap();
        assert_eq!(endpoint.socks_ports(), &SocksPorts::Pinned(9050));
        assert_eq!(endpoint.host(), "example.com");
        assert_eq!(endpoint.port(), 80);
    }

    #[test]
    fn test_config_candidates_and_credentials_reach_endpoint() {
        let config = SocksConfig {
            pinned_port: None,
            candidate_ports: vec![1984, 9150],
            ..env_socks_config()
        };
        let d: EndpointDescriptor = "tor:example.com:80".parse().unwrap();
        let endpoint = d.into_builder_with(&config).build().unwrap();

        assert_eq!(endpoint.socks_ports(), &SocksPorts::Candidates(vec![1984, 9150]));
        let credentials = endpoint.credentials().unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "s3cret");
    }

    #[test]
    fn test_positional_and_keyword_host_conflict() {
        let err = "tor:a.onion:host=b.onion:port=80"
            .parse::<EndpointDescriptor>()
            .unwrap_err();
        assert!(err.to_string().contains("host given more than once"), "{}", err);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let bad = [
            "tcp:host=example.com:port=80",
            "host=example.com:port=80",
            "tor:host=example.com:port=http",
            "tor:host=example.com:port=70000",
            "tor:host=example.com:port=80:socksPort=x",
            "tor:host=example.com:port=80:timeout=5",
            "tor:a:80:extra",
            "tor:a.onion:host=b.onion:port=80",
            "tor:a.onion:80:port=81",
            "tor:host=a.onion:port=80:port=81",
            "tor:host=a.onion:port=80:socksPort=9050:socksPort=9150",
            r"tor:host=example.com\",
        ];
        for s in bad {
            let err = s.parse::<EndpointDescriptor>().unwrap_err();
            assert!(
                matches!(err, EndpointError::InvalidDescriptor(_)),
                "{} gave {:?}",
                s,
                err
            );
        }
    }
}
