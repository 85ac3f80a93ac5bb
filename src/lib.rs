//! TCP service availability checks.
//!
//! A [`Probe`] resolves a host or IPv4 address together with a port or a
//! named service, then tries to connect a bounded number of times. Each call
//! yields exactly one [`ProbeStatus`].
//!
//! ```no_run
//! use service_probe::{Probe, ProbeConfig, ProbeStatus};
//!
//! let mut probe = Probe::system(ProbeConfig::default())?;
//! probe.configure(3, 2);
//! let status = probe.host_service("example.com", "https", None)?;
//! assert_eq!(status, ProbeStatus::Available);
//! # Ok::<(), service_probe::ProbeError>(())
//! ```

pub mod config;
pub mod prober;
pub mod resolver;
pub mod scheduler;
pub mod status;

use tracing::debug;

pub use config::{LogFormat, ProbeConfig};
pub use resolver::{
    DnsNameService, Endpoint, LookupError, NameService, NetDb, Protocol, ResolveError, Resolver,
    SystemNetDb,
};
pub use status::{ProbeError, ProbeStatus, ResolveFailure};

const PROBE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn probe_version() -> &'static str {
    PROBE_VERSION
}

/// Probing context: the retry configuration plus the name service and
/// netdb backends every probe goes through.
pub struct Probe<N = DnsNameService, D = SystemNetDb> {
    config: ProbeConfig,
    names: N,
    netdb: D,
}

impl Probe {
    /// Context backed by the system resolver and netdb.
    pub fn system(config: ProbeConfig) -> Result<Self, ProbeError> {
        let names = DnsNameService::from_system_conf().map_err(ProbeError::Resolver)?;
        Ok(Self::with_backends(config, names, SystemNetDb))
    }
}

impl<N: NameService, D: NetDb> Probe<N, D> {
    pub fn with_backends(config: ProbeConfig, names: N, netdb: D) -> Self {
        Self {
            config,
            names,
            netdb,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Applies to every probe issued after this call.
    pub fn configure(&mut self, retry_count: u32, retry_delay_secs: u64) {
        self.config.set_retry(retry_count, retry_delay_secs);
        debug!(
            retry_count = self.config.retry_count,
            retry_delay_secs = self.config.retry_delay_secs,
            "probe configured"
        );
    }

    pub fn ipv4_port(
        &self,
        ip: &str,
        port: u16,
        protocol: Option<&str>,
    ) -> Result<ProbeStatus, ProbeError> {
        self.run(self.resolver().resolve_ipv4_port(ip, port, protocol))
    }

    pub fn ipv4_service(
        &self,
        ip: &str,
        service: &str,
        protocol: Option<&str>,
    ) -> Result<ProbeStatus, ProbeError> {
        self.run(self.resolver().resolve_ipv4_service(ip, service, protocol))
    }

    pub fn host_port(
        &self,
        host: &str,
        port: u16,
        protocol: Option<&str>,
    ) -> Result<ProbeStatus, ProbeError> {
        self.run(self.resolver().resolve_host_port(host, port, protocol))
    }

    pub fn host_service(
        &self,
        host: &str,
        service: &str,
        protocol: Option<&str>,
    ) -> Result<ProbeStatus, ProbeError> {
        self.run(self.resolver().resolve_host_service(host, service, protocol))
    }

    fn resolver(&self) -> Resolver<'_, N, D> {
        Resolver::new(&self.names, &self.netdb)
    }

    fn run(&self, resolved: Result<Endpoint, ResolveError>) -> Result<ProbeStatus, ProbeError> {
        match resolved {
            Ok(endpoint) => prober::probe(&endpoint, &self.config),
            Err(ResolveError::Failed(failure)) => Ok(failure.into()),
            Err(ResolveError::Fatal(err)) => Err(err),
        }
    }
}
