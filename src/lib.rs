//! tor-endpoint - Tor SOCKS client endpoint
//!
//! Connects to a destination through the local Tor daemon's SOCKS5 proxy.
//!
//! ## Features
//!
//! - SOCKS port discovery: candidate ports are tried in order until one answers
//! - Pinned SOCKS port when the port is known
//! - SOCKS5 username/password for Tor stream isolation
//! - `tor:host=...:port=...[:socksPort=...]` endpoint strings
//! - Pluggable TCP layer, so the retry logic runs without a network

pub mod config;
pub mod endpoint;
pub mod error;

pub use config::Config;
pub use endpoint::{EndpointDescriptor, ProtocolFactory, TorClientEndpoint};
pub use error::{EndpointError, Result};
