use std::fmt;
use std::io;
use std::net::IpAddr;

use thiserror::Error;

/// Outcome of a single probe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    Available,
    Unavailable,
    UnknownProtocol,
    UnknownHost,
    UnknownService,
    InvalidIp,
}

impl ProbeStatus {
    pub fn is_available(self) -> bool {
        matches!(self, ProbeStatus::Available)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStatus::Available => "available",
            ProbeStatus::Unavailable => "unavailable",
            ProbeStatus::UnknownProtocol => "unknown protocol",
            ProbeStatus::UnknownHost => "unknown host",
            ProbeStatus::UnknownService => "unknown service",
            ProbeStatus::InvalidIp => "invalid ip",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why resolution stopped before producing an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveFailure {
    InvalidIp,
    UnknownProtocol,
    UnknownHost,
    UnknownService,
    /// The lookup failed in a way that may clear up on its own
    /// (try-again, non-recoverable, no data).
    Transient,
}

impl From<ResolveFailure> for ProbeStatus {
    fn from(failure: ResolveFailure) -> Self {
        match failure {
            ResolveFailure::InvalidIp => ProbeStatus::InvalidIp,
            ResolveFailure::UnknownProtocol => ProbeStatus::UnknownProtocol,
            ResolveFailure::UnknownHost => ProbeStatus::UnknownHost,
            ResolveFailure::UnknownService => ProbeStatus::UnknownService,
            ResolveFailure::Transient => ProbeStatus::Unavailable,
        }
    }
}

/// Conditions outside what the prober supports. These are not statuses:
/// callers are expected to report them and stop.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("only IPv4 is supported, lookup returned {0}")]
    UnsupportedFamily(IpAddr),

    #[error("unsupported protocol \"{0}\", only tcp can be probed")]
    UnsupportedProtocol(String),

    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to initialize resolver: {0}")]
    Resolver(#[source] io::Error),
}
