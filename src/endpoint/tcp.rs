//! TCP layer underneath the SOCKS5 handshake
//!
//! [`EndpointProvider`] is the seam between the retry logic and the network:
//! the Tor endpoint asks it for one [`StreamEndpoint`] per SOCKS port it tries.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Something that can be connected to, yielding a byte stream
#[async_trait]
pub trait StreamEndpoint: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Establish the connection
    async fn connect(&self) -> std::io::Result<Self::Stream>;
}

/// Builds the endpoint used to reach a SOCKS port
pub trait EndpointProvider: Send + Sync {
    type Endpoint: StreamEndpoint;

    fn endpoint(&self, host: &str, port: u16) -> Self::Endpoint;
}

impl<F, E> EndpointProvider for F
where
    F: Fn(&str, u16) -> E + Send + Sync,
    E: StreamEndpoint,
{
    type Endpoint = E;

    fn endpoint(&self, host: &str, port: u16) -> E {
        self(host, port)
    }
}

/// Plain TCP client endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpEndpoint {
    host: String,
    port: u16,
}

impl TcpEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address in `host:port` form, bracketing bare IPv6 literals
    pub fn addr(&self) -> String {
        format_tcp_addr(&self.host, self.port)
    }
}

#[async_trait]
impl StreamEndpoint for TcpEndpoint {
    type Stream = TcpStream;

    async fn connect(&self) -> std::io::Result<TcpStream> {
        let addr = self.addr();
        debug!("Opening TCP connection to {}", addr);
        let stream = TcpStream::connect(&addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Default provider: real TCP connections
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpEndpointProvider;

impl EndpointProvider for TcpEndpointProvider {
    type Endpoint = TcpEndpoint;

    fn endpoint(&self, host: &str, port: u16) -> TcpEndpoint {
        TcpEndpoint::new(host, port)
    }
}

pub(crate) fn format_tcp_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
