//! Collector endpoints and the pluggable connection-opening strategy.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs as _};
use std::time::Duration;

use crate::client::Error;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// The collector endpoint a client connects to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    /// A hostname and port, resolved freshly on every connect so that DNS failover is picked up
    /// on reconnect.
    Name(String, u16),

    /// A pre-resolved socket address.
    Addr(SocketAddr),
}

impl Endpoint {
    /// Resolves this endpoint to a concrete socket address.
    ///
    /// Hostname endpoints are resolved on every call.
    pub(crate) fn resolve(&self) -> Result<SocketAddr, Error> {
        match self {
            Endpoint::Addr(addr) => Ok(*addr),
            Endpoint::Name(host, port) => (host.as_str(), *port)
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.next())
                .ok_or_else(|| Error::Unresolved { host: host.clone() }),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Name(host, port) => write!(f, "{host}:{port}"),
            Endpoint::Addr(addr) => addr.fmt(f),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Addr(addr)
    }
}

impl From<(&str, u16)> for Endpoint {
    fn from((host, port): (&str, u16)) -> Self {
        Endpoint::Name(host.to_string(), port)
    }
}

impl From<(String, u16)> for Endpoint {
    fn from((host, port): (String, u16)) -> Self {
        Endpoint::Name(host, port)
    }
}

impl<'a> TryFrom<&'a str> for Endpoint {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        if let Ok(addr) = addr.parse::<SocketAddr>() {
            return Ok(Endpoint::Addr(addr));
        }

        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(port) => Ok(Endpoint::Name(host.to_string(), port)),
                Err(_) => Err(format!("invalid port '{port}'")),
            },
            _ => Err(format!("invalid endpoint '{addr}' (expected '<host>:<port>')")),
        }
    }
}

/// A stream-oriented connection to the collector.
///
/// Implemented for [`TcpStream`]; tests substitute an in-memory implementation.
pub trait Stream: Read + Write + Send {
    /// Returns the local address of this connection, as seen by the transport.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Shuts down the write side of this connection.
    fn shutdown_write(&self) -> io::Result<()>;
}

impl Stream for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn shutdown_write(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }
}

/// A strategy for opening connections to the collector.
///
/// This is the seam for substituting transports: tests use an in-memory implementation, and a
/// TLS-wrapping implementation would slot in here as well.
pub trait Connect {
    /// The connection type produced by this strategy.
    type Stream: Stream;

    /// Opens a connection to `addr`.
    fn connect(&self, addr: SocketAddr) -> io::Result<Self::Stream>;
}

/// The default [`Connect`] strategy: a plain TCP connection tuned for low latency.
///
/// The socket is opened with `TCP_NODELAY` so individual frames are not coalesced, and with a
/// read timeout that bounds the handshake phase against a hung peer.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpConnector {
    /// Creates a new `TcpConnector` with default timeouts.
    pub fn new() -> TcpConnector {
        TcpConnector {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets the connection-establishment timeout.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout guarding the handshake responses.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        TcpConnector::new()
    }
}

impl Connect for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        Ok(stream)
    }
}
