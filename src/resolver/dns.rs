use std::io;
use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;
use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;

use super::{LookupError, NameService};

/// Name service backed by the system resolver configuration.
pub struct DnsNameService {
    resolver: Resolver,
}

impl DnsNameService {
    /// Uses `/etc/resolv.conf` and the hosts file, falling back to the
    /// library's default upstreams when the system config can't be read.
    pub fn from_system_conf() -> io::Result<Self> {
        let (config, mut opts) = match trust_dns_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!("Could not read system resolver config, using defaults: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.ip_strategy = LookupIpStrategy::Ipv4thenIpv6;
        opts.use_hosts_file = true;

        Self::new(config, opts)
    }

    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> io::Result<Self> {
        Ok(Self {
            resolver: Resolver::new(config, opts)?,
        })
    }
}

impl NameService for DnsNameService {
    fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, LookupError> {
        let lookup = self.resolver.lookup_ip(host).map_err(classify)?;
        Ok(lookup.iter().collect())
    }

    fn reverse_lookup(&self, addr: Ipv4Addr) -> Result<Vec<String>, LookupError> {
        let lookup = self
            .resolver
            .reverse_lookup(IpAddr::V4(addr))
            .map_err(classify)?;
        Ok(lookup.iter().map(|name| name.to_string()).collect())
    }
}

fn classify(err: ResolveError) -> LookupError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => no_records(*response_code),
        ResolveErrorKind::Timeout | ResolveErrorKind::NoConnections => LookupError::TryAgain,
        ResolveErrorKind::Io(_) | ResolveErrorKind::Proto(_) => LookupError::TryAgain,
        _ => LookupError::NoRecovery,
    }
}

/// An authoritative NXDOMAIN means the name doesn't exist; NOERROR with an
/// empty answer means it exists without records of the asked type.
fn no_records(response_code: ResponseCode) -> LookupError {
    match response_code {
        ResponseCode::NXDomain => LookupError::HostNotFound,
        ResponseCode::NoError => LookupError::NoData,
        _ => LookupError::NoRecovery,
    }
}
