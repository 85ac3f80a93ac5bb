use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::resolver::Endpoint;
use crate::scheduler::RetrySchedule;
use crate::status::{ProbeError, ProbeStatus};

pub mod tcp_connect;

pub use tcp_connect::TcpConnector;

/// One connection attempt against an address.
pub trait Connect {
    fn connect(&mut self, addr: SocketAddrV4, timeout: Option<Duration>) -> io::Result<()>;
}

/// Probe `endpoint` with the retry settings from `config`.
///
/// Only stream protocols can be probed. Anything else is reported as
/// [`ProbeError::UnsupportedProtocol`] before a socket is opened.
pub fn probe(endpoint: &Endpoint, config: &ProbeConfig) -> Result<ProbeStatus, ProbeError> {
    let protocol = endpoint.protocol();
    if !protocol.is_stream() {
        return Err(ProbeError::UnsupportedProtocol(protocol.name.clone()));
    }

    let mut connector = TcpConnector::open().map_err(ProbeError::Socket)?;
    Ok(probe_with(&mut connector, endpoint.addr(), config))
}

pub fn probe_with<C: Connect + ?Sized>(
    connector: &mut C,
    addr: SocketAddrV4,
    config: &ProbeConfig,
) -> ProbeStatus {
    debug!(
        retry_count = config.retry_count,
        retry_delay_secs = config.retry_delay_secs,
        connect_timeout_ms = config.connect_timeout_ms,
        %addr,
        "probing"
    );

    let schedule = RetrySchedule::new(config.retry_count, config.retry_delay());
    let timeout = config.connect_timeout();

    let connected = schedule.run(|attempt| match connector.connect(addr, timeout) {
        Ok(()) => {
            debug!(%addr, attempt, "connected");
            true
        }
        Err(e) => {
            debug!(%addr, attempt, error = %e, "connect failed");
            false
        }
    });

    let status = if connected {
        ProbeStatus::Available
    } else {
        ProbeStatus::Unavailable
    };
    info!(%addr, %status, "probe finished");
    status
}
