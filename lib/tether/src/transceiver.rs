//! Datagram transport. Two flavors: a single-socket variant for a remote
//! peer, and a dual-socket variant for two peers sharing one host, where the
//! pair splits a port couple so the receive sockets never collide.

use crate::error::{LinkError, LinkResult};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Outcome of a bounded receive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Recv {
    /// This many bytes landed in the caller's buffer.
    Data(usize),
    /// The deadline passed without a datagram.
    Timeout,
    /// The transport cannot deliver data anymore.
    Closed,
}

/// Datagram send/receive primitive the serial processor pumps. Both calls
/// take `&self`; implementations are internally synchronized.
pub trait Transceiver: Send + Sync {
    fn send(&self, bytes: &[u8]) -> LinkResult<()>;

    /// Receives one datagram, waiting at most `timeout`.
    fn recv(&self, buf: &mut [u8], timeout: Duration) -> LinkResult<Recv>;
}

/// `set_read_timeout` rejects a zero duration.
const MIN_RECV_TIMEOUT: Duration = Duration::from_millis(1);

fn resolve(address: &str, port: u16) -> LinkResult<SocketAddr> {
    let addrs: Vec<SocketAddr> = (address, port).to_socket_addrs()?.collect();

    // The sockets here bind IPv4; prefer an IPv4 peer when the name maps to
    // both families.
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or(LinkError::AddrParse)
}

fn bounded_recv(socket: &UdpSocket, buf: &mut [u8], timeout: Duration) -> LinkResult<Recv> {
    socket.set_read_timeout(Some(timeout.max(MIN_RECV_TIMEOUT)))?;

    match socket.recv_from(buf) {
        Ok((count, _)) => Ok(Recv::Data(count)),
        Err(err) => match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Ok(Recv::Timeout),
            kind => Err(LinkError::Io(kind)),
        },
    }
}

/// Single-socket variant: binds the shared well-known port and exchanges
/// datagrams with `address:port`. Receives from any source, so the peer may
/// answer from an ephemeral port.
pub struct UdpTransceiver {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransceiver {
    pub fn new(address: &str, port: u16) -> LinkResult<UdpTransceiver> {
        let peer = resolve(address, port)?;
        let socket = UdpSocket::bind(("0.0.0.0", port))?;

        Ok(UdpTransceiver { socket, peer })
    }
}

impl Transceiver for UdpTransceiver {
    fn send(&self, bytes: &[u8]) -> LinkResult<()> {
        self.socket.send_to(bytes, self.peer)?;
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> LinkResult<Recv> {
        bounded_recv(&self.socket, buf, timeout)
    }
}

/// Dual-socket variant for two peers on one host: one port of the couple
/// receives, the other is the peer's receive port. The two ends must take
/// opposite assignments or neither will hear the other.
pub struct DualUdpTransceiver {
    recv_socket: UdpSocket,
    send_socket: UdpSocket,
    peer: SocketAddr,
}

impl DualUdpTransceiver {
    pub fn new(address: &str, recv_port: u16, send_port: u16) -> LinkResult<DualUdpTransceiver> {
        let peer = resolve(address, send_port)?;
        let recv_socket = UdpSocket::bind(("0.0.0.0", recv_port))?;
        let send_socket = UdpSocket::bind(("0.0.0.0", 0))?;

        Ok(DualUdpTransceiver {
            recv_socket,
            send_socket,
            peer,
        })
    }
}

impl Transceiver for DualUdpTransceiver {
    fn send(&self, bytes: &[u8]) -> LinkResult<()> {
        self.send_socket.send_to(bytes, self.peer)?;
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> LinkResult<Recv> {
        bounded_recv(&self.recv_socket, buf, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_dual_pair_round_trip() {
        // Opposite port assignments, as the two link roles construct them.
        let side_a = DualUdpTransceiver::new("127.0.0.1", 38750, 38751).unwrap();
        let side_b = DualUdpTransceiver::new("127.0.0.1", 38751, 38750).unwrap();

        side_a.send(b"ping").unwrap();

        let mut buf = [0u8; 64];
        match side_b.recv(&mut buf, Duration::from_millis(500)).unwrap() {
            Recv::Data(count) => assert_eq!(&buf[..count], b"ping"),
            other => panic!("Unexpected outcome {:?}", other),
        }

        side_b.send(b"pong").unwrap();

        match side_a.recv(&mut buf, Duration::from_millis(500)).unwrap() {
            Recv::Data(count) => assert_eq!(&buf[..count], b"pong"),
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_recv_timeout() {
        let side = DualUdpTransceiver::new("127.0.0.1", 38760, 38761).unwrap();

        let started = Instant::now();
        let mut buf = [0u8; 64];
        let outcome = side.recv(&mut buf, Duration::from_millis(50)).unwrap();

        assert_eq!(outcome, Recv::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_single_socket_receives_from_any_source() {
        let side = UdpTransceiver::new("127.0.0.1", 38770).unwrap();

        // A stranger on an ephemeral port can still reach the bound port.
        let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();
        stranger.send_to(b"hail", "127.0.0.1:38770").unwrap();

        let mut buf = [0u8; 64];
        match side.recv(&mut buf, Duration::from_millis(500)).unwrap() {
            Recv::Data(count) => assert_eq!(&buf[..count], b"hail"),
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let side = DualUdpTransceiver::new("127.0.0.1", 38780, 38781).unwrap();

        let mut buf = [0u8; 64];
        let outcome = side.recv(&mut buf, Duration::from_secs(0)).unwrap();

        assert_eq!(outcome, Recv::Timeout);
    }
}
