// Protocol and service tables from the system netdb (/etc/protocols, /etc/services).

use std::ffi::{CStr, CString};
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;

use super::{NetDb, Protocol};

// getprotobyname/getservbyname return pointers into static storage.
static NETDB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// IANA protocol numbers used when the system has no protocol database.
const FALLBACK_PROTOCOLS: &[(&str, i32)] = &[
    ("ip", 0),
    ("icmp", libc::IPPROTO_ICMP),
    ("tcp", libc::IPPROTO_TCP),
    ("udp", libc::IPPROTO_UDP),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNetDb;

impl NetDb for SystemNetDb {
    fn protocol_by_name(&self, name: &str) -> Option<Protocol> {
        let c_name = CString::new(name).ok()?;

        let entry = {
            let _guard = NETDB_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            // SAFETY: c_name is NUL-terminated; the returned entry is copied
            // out before the lock is released.
            unsafe {
                let entry = libc::getprotobyname(c_name.as_ptr());
                if entry.is_null() {
                    None
                } else {
                    let official = CStr::from_ptr((*entry).p_name)
                        .to_string_lossy()
                        .into_owned();
                    Some(Protocol::new(official, (*entry).p_proto))
                }
            }
        };

        entry.or_else(|| {
            FALLBACK_PROTOCOLS
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(known, number)| Protocol::new(*known, *number))
        })
    }

    fn service_port(&self, service: &str, protocol: &str) -> Option<u16> {
        let c_service = CString::new(service).ok()?;
        let c_protocol = CString::new(protocol).ok()?;

        let _guard = NETDB_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: both arguments are NUL-terminated; s_port is read before
        // the lock is released.
        unsafe {
            let entry = libc::getservbyname(c_service.as_ptr(), c_protocol.as_ptr());
            if entry.is_null() {
                return None;
            }
            // s_port holds the port in network byte order.
            Some(u16::from_be((*entry).s_port as u16))
        }
    }
}
