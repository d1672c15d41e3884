//! Which local SOCKS ports to try, and in what order

use crate::error::{EndpointError, Result};

/// Ports a Tor daemon commonly listens on: the system service first, then
/// the Tor Browser bundle.
pub const DEFAULT_SOCKS_PORTS: [u16; 2] = [9050, 9150];

/// SOCKS port selection for a Tor endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocksPorts {
    /// Guess: try each port in order until one accepts the connection
    Candidates(Vec<u16>),
    /// Only ever try this port
    Pinned(u16),
}

impl Default for SocksPorts {
    fn default() -> Self {
        Self::Candidates(DEFAULT_SOCKS_PORTS.to_vec())
    }
}

impl SocksPorts {
    /// Candidate list, rejecting an empty one
    pub fn candidates(ports: impl Into<Vec<u16>>) -> Result<Self> {
        let ports = ports.into();
        if ports.is_empty() {
            return Err(EndpointError::InvalidConfig(
                "at least one SOCKS port must be given".into(),
            ));
        }
        Ok(Self::Candidates(ports))
    }

    pub fn is_guessing(&self) -> bool {
        matches!(self, Self::Candidates(_))
    }

    pub fn as_slice(&self) -> &[u16] {
        match self {
            Self::Candidates(ports) => ports,
            Self::Pinned(port) => std::slice::from_ref(port),
        }
    }

    /// Start a fresh pass over the ports
    pub fn cursor(&self) -> PortCursor<'_> {
        PortCursor {
            ports: self.as_slice(),
            next: 0,
        }
    }
}

/// Position in one pass over [`SocksPorts`]
///
/// Each port is handed out at most once.
#[derive(Debug, Clone)]
pub struct PortCursor<'a> {
    ports: &'a [u16],
    next: usize,
}

impl PortCursor<'_> {
    /// Take the next port, or `None` once every port has been tried
    pub fn advance(&mut self) -> Option<u16> {
        let port = self.ports.get(self.next).copied()?;
        self.next += 1;
        Some(port)
    }

    /// Number of ports handed out so far
    pub fn tried(&self) -> usize {
        self.next
    }
}
