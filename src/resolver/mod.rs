//! Turns user-facing identifiers into a connectable [`Endpoint`].
//!
//! Every resolution runs its checks in a fixed order so each failure is
//! observable on its own:
//!
//! 1. the IPv4 literal is parsed (IP flavors only),
//! 2. the protocol is looked up by name,
//! 3. the address is reverse-resolved (IP flavors) or the host name is
//!    forward-resolved (host flavors),
//! 4. the service is looked up under the protocol (service flavors only).
//!
//! The first failing step decides the outcome.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};

use thiserror::Error;
use tracing::debug;

use crate::status::{ProbeError, ResolveFailure};

pub mod dns;
pub mod netdb;

pub use dns::DnsNameService;
pub use netdb::SystemNetDb;

pub const DEFAULT_PROTOCOL: &str = "tcp";

/// Transport protocol as found in the protocol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub name: String,
    pub number: i32,
}

impl Protocol {
    pub fn new(name: impl Into<String>, number: i32) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }

    /// Only TCP can be probed.
    pub fn is_stream(&self) -> bool {
        self.number == libc::IPPROTO_TCP
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.number)
    }
}

/// A fully resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    addr: SocketAddrV4,
    protocol: Protocol,
}

impl Endpoint {
    pub(crate) fn new(ip: Ipv4Addr, port: u16, protocol: Protocol) -> Self {
        Self {
            addr: SocketAddrV4::new(ip, port),
            protocol,
        }
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }
}

/// Failure modes of a name service lookup, mirroring the resolver error
/// classes of the system name service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("host not found")]
    HostNotFound,
    #[error("temporary failure, try again")]
    TryAgain,
    #[error("non-recoverable lookup failure")]
    NoRecovery,
    #[error("no address record for name")]
    NoData,
}

/// Forward and reverse host lookups.
pub trait NameService {
    fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, LookupError>;
    fn reverse_lookup(&self, addr: Ipv4Addr) -> Result<Vec<String>, LookupError>;
}

/// Protocol and service name tables.
pub trait NetDb {
    fn protocol_by_name(&self, name: &str) -> Option<Protocol>;
    /// Port in host byte order.
    fn service_port(&self, service: &str, protocol: &str) -> Option<u16>;
}

#[derive(Debug)]
pub enum ResolveError {
    Failed(ResolveFailure),
    Fatal(ProbeError),
}

impl From<ResolveFailure> for ResolveError {
    fn from(failure: ResolveFailure) -> Self {
        ResolveError::Failed(failure)
    }
}

impl From<ProbeError> for ResolveError {
    fn from(err: ProbeError) -> Self {
        ResolveError::Fatal(err)
    }
}

pub struct Resolver<'a, N: ?Sized, D: ?Sized> {
    names: &'a N,
    netdb: &'a D,
}

impl<'a, N, D> Resolver<'a, N, D>
where
    N: NameService + ?Sized,
    D: NetDb + ?Sized,
{
    pub fn new(names: &'a N, netdb: &'a D) -> Self {
        Self { names, netdb }
    }

    pub fn resolve_ipv4_port(
        &self,
        ip: &str,
        port: u16,
        protocol: Option<&str>,
    ) -> Result<Endpoint, ResolveError> {
        let addr = parse_ipv4(ip)?;
        let protocol = self.protocol(protocol)?;
        self.verify_address(addr)?;
        Ok(Endpoint::new(addr, port, protocol))
    }

    pub fn resolve_ipv4_service(
        &self,
        ip: &str,
        service: &str,
        protocol: Option<&str>,
    ) -> Result<Endpoint, ResolveError> {
        let addr = parse_ipv4(ip)?;
        let protocol = self.protocol(protocol)?;
        self.verify_address(addr)?;
        let port = self.service_port(service, &protocol)?;
        Ok(Endpoint::new(addr, port, protocol))
    }

    pub fn resolve_host_port(
        &self,
        host: &str,
        port: u16,
        protocol: Option<&str>,
    ) -> Result<Endpoint, ResolveError> {
        let protocol = self.protocol(protocol)?;
        let addr = self.lookup_host(host)?;
        Ok(Endpoint::new(addr, port, protocol))
    }

    pub fn resolve_host_service(
        &self,
        host: &str,
        service: &str,
        protocol: Option<&str>,
    ) -> Result<Endpoint, ResolveError> {
        let protocol = self.protocol(protocol)?;
        let addr = self.lookup_host(host)?;
        let port = self.service_port(service, &protocol)?;
        Ok(Endpoint::new(addr, port, protocol))
    }

    fn protocol(&self, name: Option<&str>) -> Result<Protocol, ResolveFailure> {
        let name = name.unwrap_or(DEFAULT_PROTOCOL);
        match self.netdb.protocol_by_name(name) {
            Some(protocol) => {
                debug!(%protocol, "protocol entry");
                Ok(protocol)
            }
            None => {
                debug!(protocol = name, "unknown protocol");
                Err(ResolveFailure::UnknownProtocol)
            }
        }
    }

    fn verify_address(&self, addr: Ipv4Addr) -> Result<(), ResolveFailure> {
        match self.names.reverse_lookup(addr) {
            Ok(names) => {
                debug!(%addr, ?names, "host entry");
                Ok(())
            }
            Err(LookupError::HostNotFound) => {
                debug!(%addr, "host by ip not found");
                Err(ResolveFailure::UnknownHost)
            }
            Err(err) => {
                debug!(%addr, error = %err, "reverse lookup failed");
                Err(ResolveFailure::Transient)
            }
        }
    }

    // TODO: fall back to the remaining addresses when the first one refuses.
    fn lookup_host(&self, host: &str) -> Result<Ipv4Addr, ResolveError> {
        let addrs = self.names.lookup_host(host).map_err(|err| {
            debug!(host, error = %err, "invalid host");
            ResolveFailure::UnknownHost
        })?;
        debug!(host, ?addrs, "host entry");

        match addrs.first() {
            Some(IpAddr::V4(addr)) => Ok(*addr),
            Some(other) => Err(ProbeError::UnsupportedFamily(*other).into()),
            None => Err(ResolveFailure::UnknownHost.into()),
        }
    }

    fn service_port(&self, service: &str, protocol: &Protocol) -> Result<u16, ResolveFailure> {
        match self.netdb.service_port(service, &protocol.name) {
            Some(port) => {
                debug!(service, port, protocol = %protocol.name, "service entry");
                Ok(port)
            }
            None => {
                debug!(service, "invalid service");
                Err(ResolveFailure::UnknownService)
            }
        }
    }
}

/// Strict dotted-quad parse.
pub fn parse_ipv4(ip: &str) -> Result<Ipv4Addr, ResolveFailure> {
    ip.parse::<Ipv4Addr>().map_err(|_| ResolveFailure::InvalidIp)
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory name service that records every query it receives.
    #[derive(Default)]
    pub struct FakeNames {
        pub forward: HashMap<String, Result<Vec<IpAddr>, LookupError>>,
        pub reverse: HashMap<Ipv4Addr, Result<Vec<String>, LookupError>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeNames {
        pub fn with_host(mut self, host: &str, addrs: &[&str]) -> Self {
            let addrs = addrs.iter().map(|a| a.parse().unwrap()).collect();
            self.forward.insert(host.to_string(), Ok(addrs));
            self
        }

        pub fn with_ptr(mut self, addr: &str, result: Result<Vec<String>, LookupError>) -> Self {
            self.reverse.insert(addr.parse().unwrap(), result);
            self
        }
    }

    impl NameService for FakeNames {
        fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, LookupError> {
            self.calls.borrow_mut().push(format!("forward {host}"));
            self.forward
                .get(host)
                .cloned()
                .unwrap_or(Err(LookupError::HostNotFound))
        }

        fn reverse_lookup(&self, addr: Ipv4Addr) -> Result<Vec<String>, LookupError> {
            self.calls.borrow_mut().push(format!("reverse {addr}"));
            self.reverse
                .get(&addr)
                .cloned()
                .unwrap_or(Err(LookupError::HostNotFound))
        }
    }

    #[derive(Default)]
    pub struct FakeNetDb {
        pub calls: RefCell<Vec<String>>,
    }

    impl NetDb for FakeNetDb {
        fn protocol_by_name(&self, name: &str) -> Option<Protocol> {
            self.calls.borrow_mut().push(format!("protocol {name}"));
            match name {
                "tcp" => Some(Protocol::new("tcp", 6)),
                "udp" => Some(Protocol::new("udp", 17)),
                _ => None,
            }
        }

        fn service_port(&self, service: &str, protocol: &str) -> Option<u16> {
            self.calls.borrow_mut().push(format!("service {service}/{protocol}"));
            match (service, protocol) {
                ("http", "tcp") => Some(80),
                ("https", "tcp") => Some(443),
                ("domain", "tcp" | "udp") => Some(53),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeNames, FakeNetDb};
    use super::*;

    fn failure(result: Result<Endpoint, ResolveError>) -> ResolveFailure {
        match result {
            Err(ResolveError::Failed(failure)) => failure,
            other => panic!("expected resolution failure, got {other:?}"),
        }
    }

    fn names() -> FakeNames {
        FakeNames::default()
            .with_host("example.com", &["93.184.215.14", "93.184.215.15"])
            .with_host("v6only.test", &["2001:db8::1"])
            .with_ptr("93.184.215.14", Ok(vec!["example.com.".to_string()]))
            .with_ptr("10.0.0.1", Err(LookupError::TryAgain))
            .with_ptr("10.0.0.2", Err(LookupError::NoRecovery))
            .with_ptr("10.0.0.3", Err(LookupError::NoData))
    }

    #[test]
    fn test_malformed_ip_stops_before_any_lookup() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        for ip in ["1.2.3.999", "1.2.3", "a.b.c.d", "", "1.2.3.4.5"] {
            assert_eq!(
                failure(resolver.resolve_ipv4_port(ip, 443, None)),
                ResolveFailure::InvalidIp,
                "{ip}"
            );
            assert_eq!(
                failure(resolver.resolve_ipv4_service(ip, "https", None)),
                ResolveFailure::InvalidIp,
                "{ip}"
            );
        }
        assert!(names.calls.borrow().is_empty());
        assert!(netdb.calls.borrow().is_empty());
    }

    #[test]
    fn test_unknown_protocol_stops_before_host_and_service() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        assert_eq!(
            failure(resolver.resolve_host_port("example.com", 53, Some("4321udp1234"))),
            ResolveFailure::UnknownProtocol
        );
        assert_eq!(
            failure(resolver.resolve_host_service("example.com", "http", Some("4321udp1234"))),
            ResolveFailure::UnknownProtocol
        );
        assert_eq!(
            failure(resolver.resolve_ipv4_service("93.184.215.14", "http", Some("nope"))),
            ResolveFailure::UnknownProtocol
        );
        assert!(names.calls.borrow().is_empty());
        assert!(
            netdb
                .calls
                .borrow()
                .iter()
                .all(|call| call.starts_with("protocol"))
        );
    }

    #[test]
    fn test_unknown_host() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        assert_eq!(
            failure(resolver.resolve_host_port("4321example1234.com", 443, None)),
            ResolveFailure::UnknownHost
        );
        assert_eq!(
            failure(resolver.resolve_ipv4_service("0.0.0.0", "https", None)),
            ResolveFailure::UnknownHost
        );
    }

    #[test]
    fn test_host_failure_wins_over_service_failure() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        assert_eq!(
            failure(resolver.resolve_host_service("4321example1234.com", "4321https1234", None)),
            ResolveFailure::UnknownHost
        );
        assert_eq!(
            failure(resolver.resolve_ipv4_service("0.0.0.0", "4321https1234", None)),
            ResolveFailure::UnknownHost
        );
    }

    #[test]
    fn test_unknown_service() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        assert_eq!(
            failure(resolver.resolve_host_service("example.com", "4321https1234", None)),
            ResolveFailure::UnknownService
        );
        assert_eq!(
            failure(resolver.resolve_ipv4_service("93.184.215.14", "4321https1234", None)),
            ResolveFailure::UnknownService
        );
    }

    #[test]
    fn test_transient_reverse_failures_are_not_config_errors() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            assert_eq!(
                failure(resolver.resolve_ipv4_port(ip, 80, None)),
                ResolveFailure::Transient,
                "{ip}"
            );
        }
    }

    #[test]
    fn test_service_port_comes_from_table() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        let endpoint = resolver
            .resolve_ipv4_service("93.184.215.14", "https", None)
            .unwrap();
        assert_eq!(endpoint.addr(), "93.184.215.14:443".parse().unwrap());
        assert!(endpoint.protocol().is_stream());
    }

    #[test]
    fn test_host_uses_first_address() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        let endpoint = resolver.resolve_host_port("example.com", 8080, None).unwrap();
        assert_eq!(endpoint.addr(), "93.184.215.14:8080".parse().unwrap());
    }

    #[test]
    fn test_non_ipv4_address_is_fatal() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        match resolver.resolve_host_port("v6only.test", 80, None) {
            Err(ResolveError::Fatal(ProbeError::UnsupportedFamily(addr))) => {
                assert_eq!(addr, "2001:db8::1".parse::<IpAddr>().unwrap());
            }
            other => panic!("expected fatal family error, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_protocol_is_carried_to_endpoint() {
        let names = names();
        let netdb = FakeNetDb::default();
        let resolver = Resolver::new(&names, &netdb);

        let endpoint = resolver
            .resolve_host_service("example.com", "domain", Some("udp"))
            .unwrap();
        assert_eq!(endpoint.protocol(), &Protocol::new("udp", 17));
        assert!(!endpoint.protocol().is_stream());
        assert!(
            netdb
                .calls
                .borrow()
                .contains(&"service domain/udp".to_string())
        );
    }
}
