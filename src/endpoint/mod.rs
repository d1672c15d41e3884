//! Tor client endpoint
//!
//! This module provides:
//! - the TCP endpoint seam used to reach the local SOCKS port
//! - SOCKS5 CONNECT on top of any stream endpoint
//! - SOCKS port discovery with sequential retry
//! - the `tor:host=...:port=...` text form

pub mod descriptor;
pub mod factory;
pub mod ports;
pub mod socks;
pub mod tcp;
pub mod tor;

pub use descriptor::EndpointDescriptor;
pub use factory::{FnFactory, ProtocolFactory, StreamFactory};
pub use ports::{PortCursor, SocksPorts, DEFAULT_SOCKS_PORTS};
pub use socks::{ProxiedStream, Socks5Endpoint, SocksCredentials};
pub use tcp::{EndpointProvider, StreamEndpoint, TcpEndpoint, TcpEndpointProvider};
pub use tor::{ConnectState, TorClientEndpoint, TorClientEndpointBuilder, SOCKS_HOST};
