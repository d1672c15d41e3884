//! tor-endpoint - Entry Point
//!
//! Fetches a page over Tor: `tor-endpoint tor:host=<onion>:port=80 --path /`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tor_endpoint::endpoint::{ProxiedStream, TcpEndpoint};
use tor_endpoint::{Config, EndpointDescriptor, EndpointError, ProtocolFactory, Result, TorClientEndpoint};

#[derive(Parser, Debug)]
#[command(name = "tor-endpoint", version, about = "Fetch a page through the local Tor SOCKS proxy")]
struct Args {
    /// Endpoint string, e.g. tor:host=example.onion:port=80[:socksPort=9050]
    descriptor: String,

    /// Path to request
    #[arg(long, default_value = "/")]
    path: String,

    /// Give up connecting after this many seconds (overrides TOR_CONNECT_TIMEOUT)
    #[arg(long)]
    timeout: Option<u64>,
}

/// Largest response `HttpGet` will buffer
const MAX_RESPONSE_BYTES: u64 = 4 * 1024 * 1024;

/// Sends a single `GET` once the tunnel is up and reads the whole response
struct HttpGet {
    /// `Host` header value, `host:port` with IPv6 literals bracketed
    authority: String,
    path: String,
}

impl HttpGet {
    fn new(host: &str, port: u16, path: String) -> Self {
        Self {
            authority: TcpEndpoint::new(host, port).addr(),
            path,
        }
    }

    fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, self.authority
        )
    }
}

#[async_trait]
impl<S> ProtocolFactory<S> for HttpGet
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Protocol = String;

    async fn build_protocol(&self, mut stream: ProxiedStream<S>) -> Result<String> {
        debug!("Sending GET {} to {}", self.path, self.authority);
        stream.write_all(self.request().as_bytes()).await?;

        let response = read_response(&mut stream, MAX_RESPONSE_BYTES).await?;
        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

/// Read until EOF, failing once more than `limit` bytes arrive
async fn read_response<R: AsyncRead + Unpin>(reader: R, limit: u64) -> Result<Vec<u8>> {
    let mut response = Vec::new();
    reader.take(limit + 1).read_to_end(&mut response).await?;

    if response.is_empty() {
        return Err(EndpointError::Protocol("empty HTTP response".into()));
    }
    if response.len() as u64 > limit {
        return Err(EndpointError::Protocol(format!(
            "HTTP response larger than {} bytes",
            limit
        )));
    }
    Ok(response)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    init_tracing(&config);

    let descriptor = EndpointDescriptor::from_str(&args.descriptor)?;
    let mut endpoint = descriptor.into_builder_with(&config.socks).build()?;

    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.connect_timeout());

    info!(
        "Connecting to {}:{} via Tor SOCKS ports {:?}",
        endpoint.host(),
        endpoint.port(),
        endpoint.socks_ports().as_slice()
    );
    if let Some(credentials) = endpoint.credentials() {
        debug!("Authenticating to the SOCKS port as {}", credentials.username);
    }

    let factory = HttpGet::new(endpoint.host(), endpoint.port(), args.path);

    let outcome = tokio::time::timeout(timeout, endpoint.connect(&factory)).await;
    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!("Connection failed after {} attempt(s): {}", endpoint.attempts(), e);
            return Err(e.into());
        }
        Err(_) => {
            error!("Connection timed out after {}s", timeout.as_secs());
            return Err(EndpointError::Timeout.into());
        }
    };

    println!("{}", response);
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("tor_endpoint={}", config.log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
