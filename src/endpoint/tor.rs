//! Client endpoint reaching a destination through the local Tor SOCKS port
//!
//! When the SOCKS port is not known, the endpoint walks a list of candidate
//! ports, one connection attempt at a time, until the Tor daemon answers.

use std::str::FromStr;

use tracing::{debug, info, instrument, warn};

use super::descriptor::EndpointDescriptor;
use super::factory::ProtocolFactory;
use super::ports::SocksPorts;
use super::socks::{Socks5Endpoint, SocksCredentials};
use super::tcp::{EndpointProvider, StreamEndpoint, TcpEndpointProvider};
use crate::config::SocksConfig;
use crate::error::{EndpointError, Result};

/// Address the Tor SOCKS listener is reached on
pub const SOCKS_HOST: &str = "127.0.0.1";

/// Where a Tor endpoint is in its connection sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectState {
    #[default]
    Idle,
    Attempting(u16),
    Succeeded(u16),
    Failed,
}

type StreamOf<P> = <<P as EndpointProvider>::Endpoint as StreamEndpoint>::Stream;

/// Connects to `host:port` through the local Tor SOCKS5 proxy
pub struct TorClientEndpoint<P = TcpEndpointProvider> {
    host: String,
    port: u16,
    ports: SocksPorts,
    credentials: Option<SocksCredentials>,
    provider: P,
    state: ConnectState,
    attempts: usize,
}

impl TorClientEndpoint {
    pub fn builder() -> TorClientEndpointBuilder {
        TorClientEndpointBuilder::default()
    }

    /// Endpoint for `host:port` using the default candidate ports
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::builder().host(host).port(port).build()
    }

    /// Build an endpoint from a `tor:host=...:port=...[:socksPort=...]` string
    pub fn from_descriptor(descriptor: &str) -> Result<Self> {
        EndpointDescriptor::from_str(descriptor)?.into_builder().build()
    }
}

impl<P: EndpointProvider> TorClientEndpoint<P> {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socks_ports(&self) -> &SocksPorts {
        &self.ports
    }

    pub fn credentials(&self) -> Option<&SocksCredentials> {
        self.credentials.as_ref()
    }

    pub fn state(&self) -> ConnectState {
        self.state
    }

    /// Connection attempts made by the most recent `connect` call
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Connect to the destination and build the caller's protocol on top.
    ///
    /// Candidate SOCKS ports are tried strictly in order. Only a failure to
    /// reach the proxy moves on to the next port; any other error is returned
    /// straight away. Once the candidates run out, the last connection error
    /// is returned as-is. Every call starts again from the first port.
    #[instrument(skip(self, factory), fields(target = %self.host, target_port = self.port))]
    pub async fn connect<F>(&mut self, factory: &F) -> Result<F::Protocol>
    where
        F: ProtocolFactory<StreamOf<P>>,
    {
        self.attempts = 0;
        let guessing = self.ports.is_guessing();
        let mut cursor = self.ports.cursor();

        let Some(mut socks_port) = cursor.advance() else {
            self.state = ConnectState::Failed;
            return Err(EndpointError::InvalidConfig(
                "no SOCKS ports to try".into(),
            ));
        };

        loop {
            self.state = ConnectState::Attempting(socks_port);
            self.attempts += 1;
            debug!(
                "Trying Tor SOCKS port {} (attempt {}/{})",
                socks_port,
                cursor.tried(),
                self.ports.as_slice().len()
            );

            let socks = Socks5Endpoint::new(
                self.provider.endpoint(SOCKS_HOST, socks_port),
                &self.host,
                self.port,
            )
            .with_credentials(self.credentials.as_ref());

            let err = match socks.connect().await {
                Ok(stream) => {
                    let result = factory.build_protocol(stream).await;
                    self.state = match &result {
                        Ok(_) => {
                            info!("Connected through Tor SOCKS port {}", socks_port);
                            ConnectState::Succeeded(socks_port)
                        }
                        Err(_) => ConnectState::Failed,
                    };
                    return result;
                }
                Err(e) => e,
            };

            if !err.is_retryable() || !guessing {
                self.state = ConnectState::Failed;
                return Err(err);
            }

            match cursor.advance() {
                Some(next) => {
                    warn!(
                        "Tor SOCKS port {} unreachable: {}, trying {}",
                        socks_port, err, next
                    );
                    socks_port = next;
                }
                None => {
                    warn!(
                        "Tor SOCKS port {} unreachable: {}, no candidates left",
                        socks_port, err
                    );
                    self.state = ConnectState::Failed;
                    return Err(err);
                }
            }
        }
    }
}

impl<P> std::fmt::Debug for TorClientEndpoint<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorClientEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ports", &self.ports)
            .field("credentials", &self.credentials)
            .field("state", &self.state)
            .finish()
    }
}

/// Builder for [`TorClientEndpoint`]
///
/// `host` and `port` are required; `build` fails with
/// [`EndpointError::InvalidConfig`] when either is missing.
#[derive(Debug, Clone)]
pub struct TorClientEndpointBuilder<P = TcpEndpointProvider> {
    host: Option<String>,
    port: Option<u16>,
    ports: SocksPorts,
    credentials: Option<SocksCredentials>,
    provider: P,
}

impl Default for TorClientEndpointBuilder {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            ports: SocksPorts::default(),
            credentials: None,
            provider: TcpEndpointProvider,
        }
    }
}

impl<P> TorClientEndpointBuilder<P> {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Only try this SOCKS port, never guess
    pub fn socks_port(mut self, port: u16) -> Self {
        self.ports = SocksPorts::Pinned(port);
        self
    }

    /// Replace the candidate SOCKS ports tried when none is pinned
    pub fn candidate_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = SocksPorts::Candidates(ports.into());
        self
    }

    pub fn credentials(mut self, credentials: SocksCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Apply SOCKS settings loaded from the environment
    pub fn socks_config(mut self, config: &SocksConfig) -> Self {
        self.ports = match config.pinned_port {
            Some(port) => SocksPorts::Pinned(port),
            None => SocksPorts::Candidates(config.candidate_ports.clone()),
        };
        if let Some(credentials) = &config.credentials {
            self.credentials = Some(credentials.clone());
        }
        self
    }

    /// Swap the way SOCKS ports are reached
    pub fn endpoint_provider<Q: EndpointProvider>(self, provider: Q) -> TorClientEndpointBuilder<Q> {
        TorClientEndpointBuilder {
            host: self.host,
            port: self.port,
            ports: self.ports,
            credentials: self.credentials,
            provider,
        }
    }

    pub fn build(self) -> Result<TorClientEndpoint<P>>
    where
        P: EndpointProvider,
    {
        let (Some(host), Some(port)) = (self.host, self.port) else {
            return Err(EndpointError::InvalidConfig(
                "host and port must be specified".into(),
            ));
        };

        let ports = match self.ports {
            SocksPorts::Candidates(candidates) => SocksPorts::candidates(candidates)?,
            pinned => pinned,
        };

        Ok(TorClientEndpoint {
            host,
            port,
            ports,
            credentials: self.credentials,
            provider: self.provider,
            state: ConnectState::Idle,
            attempts: 0,
        })
    }
}
