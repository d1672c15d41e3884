//! SOCKS5 CONNECT over an arbitrary stream endpoint

use tokio_socks::tcp::Socks5Stream;
use tracing::{debug, instrument};

use super::tcp::StreamEndpoint;
use crate::error::{EndpointError, Result};

/// A stream that has completed the SOCKS5 CONNECT handshake
pub type ProxiedStream<S> = Socks5Stream<S>;

/// Username/password sent in the SOCKS5 handshake
///
/// Tor keeps streams with different credentials on different circuits, so
/// this doubles as a stream isolation key.
#[derive(Clone, PartialEq, Eq)]
pub struct SocksCredentials {
    pub username: String,
    pub password: String,
}

impl SocksCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(EndpointError::InvalidConfig(
                "SOCKS username and password must not be empty".into(),
            ));
        }
        if username.len() > 255 || password.len() > 255 {
            return Err(EndpointError::InvalidConfig(
                "SOCKS username and password must be at most 255 bytes".into(),
            ));
        }
        Ok(Self { username, password })
    }
}

impl std::fmt::Debug for SocksCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocksCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Endpoint that reaches `host:port` through a SOCKS5 proxy behind `proxy`
pub struct Socks5Endpoint<'a, E> {
    proxy: E,
    host: &'a str,
    port: u16,
    credentials: Option<&'a SocksCredentials>,
}

impl<'a, E: StreamEndpoint> Socks5Endpoint<'a, E> {
    pub fn new(proxy: E, host: &'a str, port: u16) -> Self {
        Self {
            proxy,
            host,
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<&'a SocksCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Connect to the proxy and run the CONNECT handshake.
    ///
    /// A failure to reach the proxy is reported as [`EndpointError::Connect`];
    /// everything the handshake rejects comes back as [`EndpointError::Socks`].
    #[instrument(skip(self), fields(target = %self.host, target_port = self.port))]
    pub async fn connect(&self) -> Result<ProxiedStream<E::Stream>> {
        let socket = self.proxy.connect().await.map_err(EndpointError::Connect)?;

        let stream = match self.credentials {
            Some(creds) => {
                Socks5Stream::connect_with_password_and_socket(
                    socket,
                    (self.host, self.port),
                    &creds.username,
                    &creds.password,
                )
                .await?
            }
            None => Socks5Stream::connect_with_socket(socket, (self.host, self.port)).await?,
        };

        debug!("SOCKS5 connection established");
        Ok(stream)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Byte scripts for a well-behaved SOCKS5 proxy

    /// Greeting without authentication: VER, NMETHODS, NO AUTH
    pub const GREETING: [u8; 3] = [0x05, 0x01, 0x00];

    /// Server picks NO AUTH
    pub const METHOD_NO_AUTH: [u8; 2] = [0x05, 0x00];

    /// Success reply bound to 0.0.0.0:0
    pub const REPLY_SUCCEEDED: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

    /// CONNECT request for a domain name target
    pub fn connect_request(host: &str, port: u16) -> Vec<u8> {
        let mut req = vec![0x05, 0x01, 0x00, 0x03, host.len() as u8];
        req.extend_from_slice(host.as_bytes());
        req.extend_from_slice(&port.to_be_bytes());
        req
    }

    /// Mock of a proxy that accepts a CONNECT to `host:port`
    pub fn accepting_proxy(host: &str, port: u16) -> tokio_test::io::Mock {
        tokio_test::io::Builder::new()
            .write(&GREETING)
            .read(&METHOD_NO_AUTH)
            .write(&connect_request(host, port))
            .read(&REPLY_SUCCEEDED)
            .build()
    }
}
