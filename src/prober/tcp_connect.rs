use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::trace;

use super::Connect;

/// Blocking TCP connector holding one socket for the whole probe.
///
/// The socket is reused between attempts while it is back in the closed
/// state (the previous attempt was refused). After any other failure, such
/// as a timeout with the handshake still pending, it is closed and the next
/// attempt opens a fresh one. The socket is closed on drop.
pub struct TcpConnector {
    socket: Option<Socket>,
}

impl TcpConnector {
    pub fn open() -> io::Result<Self> {
        Ok(Self {
            socket: Some(new_socket()?),
        })
    }
}

fn new_socket() -> io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
}

impl Connect for TcpConnector {
    fn connect(&mut self, addr: SocketAddrV4, timeout: Option<Duration>) -> io::Result<()> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => new_socket()?,
        };

        let sock_addr = SockAddr::from(addr);
        let res = match timeout {
            Some(timeout) => socket.connect_timeout(&sock_addr, timeout),
            None => socket.connect(&sock_addr),
        };

        match res {
            Ok(()) => {
                self.socket = Some(socket);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                self.socket = Some(socket);
                Err(e)
            }
            Err(e) => {
                trace!(%addr, error = %e, "discarding socket");
                Err(e)
            }
        }
    }
}
