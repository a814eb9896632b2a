//! The transport-backed protocol client.

use std::io;
use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error as ThisError;
use tracing::{debug, trace};

use crate::connector::{Connect, Endpoint, Stream, TcpConnector};
use crate::proto::{self, MetricKind};
use crate::sender::Sender;

const DEFAULT_COLLECTOR_HOST: &str = "collector.instrumentalapp.com";
const DEFAULT_COLLECTOR_PORT: u16 = 8000;

/// Identifies this library in the `hello` handshake line.
const VERSION_STRING: &str = concat!("rust/instrumental_client/", env!("CARGO_PKG_VERSION"));

/// Errors that could occur while connecting to or sending to the collector.
#[derive(Debug, ThisError)]
pub enum Error {
    /// `connect` was called while a live connection already existed.
    #[error("already connected")]
    AlreadyConnected,

    /// The collector hostname did not resolve to a usable address.
    #[error("failed to resolve collector host '{host}'")]
    Unresolved {
        /// The hostname that could not be resolved.
        host: String,
    },

    /// The collector rejected the `hello` line.
    #[error("hello failed")]
    Hello,

    /// The collector rejected the API key.
    #[error("authenticate failed")]
    Authenticate,

    /// The streamer's worker thread could not be spawned.
    #[error("failed to spawn streamer worker thread")]
    Worker,

    /// An I/O failure on the connection.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A blocking client for the collector protocol.
///
/// The client owns at most one live connection at a time. It starts disconnected;
/// [`send`][Sender::send] and the `notice` family transparently run the full
/// connect-and-authenticate sequence when no connection is held, so the very first emission
/// establishes the session.
///
/// The client is not internally synchronized and never retries a failed operation; wrap it in a
/// [`Streamer`](crate::Streamer) for non-blocking use, and consult
/// [`failures`][Sender::failures] for circuit-breaking decisions.
pub struct Client<C: Connect = TcpConnector> {
    api_key: String,
    endpoint: Endpoint,
    connector: C,
    conn: Option<C::Stream>,
    failures: u32,
}

impl Client<TcpConnector> {
    /// Creates a client for the default collector endpoint
    /// (`collector.instrumentalapp.com:8000`).
    pub fn new(api_key: impl Into<String>) -> Client<TcpConnector> {
        Client::with_endpoint(api_key, (DEFAULT_COLLECTOR_HOST, DEFAULT_COLLECTOR_PORT))
    }

    /// Creates a client for the given collector endpoint.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: impl Into<Endpoint>,
    ) -> Client<TcpConnector> {
        Client::with_connector(api_key, endpoint, TcpConnector::new())
    }
}

impl<C: Connect> Client<C> {
    /// Creates a client that opens connections through a custom [`Connect`] strategy.
    pub fn with_connector(
        api_key: impl Into<String>,
        endpoint: impl Into<Endpoint>,
        connector: C,
    ) -> Client<C> {
        Client {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            connector,
            conn: None,
            failures: 0,
        }
    }

    /// Connects if no live connection is held.
    fn ensure_connected(&mut self) -> Result<(), Error> {
        if !Sender::is_connected(self) {
            self.connect()?;
        }
        Ok(())
    }

    /// Writes one already-rendered frame, keeping the failure count symmetric: any write failure
    /// increments it, any success resets it to zero.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no live connection",
                )))
            }
        };

        match conn.write_all(frame) {
            Ok(()) => {
                self.failures = 0;
                trace!(len = frame.len(), "frame written");
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                Err(Error::Io(e))
            }
        }
    }
}

impl<C: Connect> Sender for Client<C> {
    fn connect(&mut self) -> Result<(), Error> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        // Fresh resolution every attempt, so DNS failover is picked up on reconnect.
        let addr = self.endpoint.resolve()?;
        debug!(endpoint = %self.endpoint, %addr, "connecting to collector");

        let mut stream = self.connector.connect(addr)?;
        match handshake(&mut stream, &self.api_key) {
            Ok(()) => {
                debug!("connected and authenticated");
                self.conn = Some(stream);
                Ok(())
            }
            Err(e) => {
                // A half-open handshake must not leak a handle: tear it down before surfacing.
                let _ = stream.shutdown_write();
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        // `close` is the only place the write side is shut down, and it releases the handle, so
        // holding a handle implies a writable connection.
        self.conn.is_some()
    }

    fn send(
        &mut self,
        kind: MetricKind,
        name: &str,
        value: &str,
        timestamp: u64,
    ) -> Result<(), Error> {
        self.ensure_connected()?;

        let frame = proto::render_metric(kind, name, value, timestamp);
        self.write_frame(frame.as_bytes())
    }

    fn notice_at(&mut self, name: &str, start: SystemTime, duration: Duration) {
        let start_secs = start.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        let frame = proto::render_notice(start_secs, duration.as_secs(), name);

        let result = self.ensure_connected().and_then(|()| self.write_frame(frame.as_bytes()));
        if let Err(e) = result {
            // Notices are fire-and-forget telemetry and must never disrupt the caller.
            debug!(error = %e, "notice dropped");
            let _ = self.close();
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        if let Some(conn) = self.conn.as_mut() {
            conn.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(conn) = self.conn.take() {
            debug!("closing collector connection");
            conn.shutdown_write()?;
        }
        Ok(())
    }

    fn failures(&self) -> u32 {
        self.failures
    }
}

/// Runs the `hello`/`authenticate` exchange on a freshly opened connection.
fn handshake<S: Stream>(stream: &mut S, api_key: &str) -> Result<(), Error> {
    let hostname =
        stream.local_addr().map(|addr| addr.ip().to_string()).unwrap_or_else(|_| "?".to_string());

    let hello = format!(
        "hello version {VERSION_STRING} hostname {hostname} pid {pid} runtime {runtime} platform {platform}\n",
        pid = std::process::id(),
        runtime = runtime_info(),
        platform = platform_info(),
    );
    stream.write_all(hello.as_bytes())?;
    stream.flush()?;
    if read_line(stream)? != "ok" {
        return Err(Error::Hello);
    }

    stream.write_all(format!("authenticate {api_key}\n").as_bytes())?;
    stream.flush()?;
    if read_line(stream)? != "ok" {
        return Err(Error::Authenticate);
    }

    Ok(())
}

/// Reads one LF-terminated line, without the terminator.
///
/// Reads byte-at-a-time on purpose: only the two handshake responses are ever read, and a
/// buffered reader could otherwise consume bytes past the line boundary.
fn read_line<S: Stream>(stream: &mut S) -> io::Result<String> {
    let mut line = Vec::with_capacity(16);
    let mut byte = [0u8; 1];
    loop {
        if stream.read(&mut byte)? == 0 || byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn runtime_info() -> String {
    let rust_version = env!("CARGO_PKG_RUST_VERSION");
    format!("rust/{}", if rust_version.is_empty() { "?" } else { rust_version })
}

fn platform_info() -> String {
    format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS).replace(' ', "_")
}
