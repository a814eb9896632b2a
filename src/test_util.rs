//! In-memory connection doubles for exercising the client without a network.

use std::io::{self, Cursor, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::connector::{Connect, Stream};

/// A gate that blocks writes until opened, for observing queued sends in flight.
pub(crate) struct Gate {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Arc<Gate> {
        Arc::new(Gate { open: Mutex::new(false), condvar: Condvar::new() })
    }

    pub(crate) fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.condvar.wait(&mut open);
        }
    }
}

/// A [`Connect`] double producing in-memory streams.
///
/// Every connection reads the same scripted handshake responses; all bytes written through any
/// connection accumulate in one shared buffer for inspection.
#[derive(Clone)]
pub(crate) struct MockConnector {
    responses: Vec<u8>,
    written: Arc<Mutex<Vec<u8>>>,
    connects: Arc<AtomicUsize>,
    refuse: bool,
    fail_writes: Arc<AtomicBool>,
    gate: Option<Arc<Gate>>,
}

impl MockConnector {
    /// A connector whose collector accepts the handshake and the API key.
    pub(crate) fn ok() -> MockConnector {
        MockConnector::with_responses(b"ok\nok\n")
    }

    /// A connector whose collector answers the handshake with the given scripted lines.
    pub(crate) fn with_responses(responses: &[u8]) -> MockConnector {
        MockConnector {
            responses: responses.to_vec(),
            written: Arc::new(Mutex::new(Vec::new())),
            connects: Arc::new(AtomicUsize::new(0)),
            refuse: false,
            fail_writes: Arc::new(AtomicBool::new(false)),
            gate: None,
        }
    }

    /// A connector that refuses every connection attempt.
    pub(crate) fn refusing() -> MockConnector {
        MockConnector { refuse: true, ..MockConnector::ok() }
    }

    /// Blocks all writes on the given gate until it is opened.
    pub(crate) fn gated(gate: Arc<Gate>) -> MockConnector {
        MockConnector { gate: Some(gate), ..MockConnector::ok() }
    }

    /// Returns everything written through this connector's streams so far.
    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    /// Returns the number of connection attempts made so far.
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail (or succeed again) on live streams.
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Connect for MockConnector {
    type Stream = MockStream;

    fn connect(&self, _addr: SocketAddr) -> io::Result<MockStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        }

        Ok(MockStream {
            responses: Cursor::new(self.responses.clone()),
            written: Arc::clone(&self.written),
            fail_writes: Arc::clone(&self.fail_writes),
            gate: self.gate.clone(),
        })
    }
}

pub(crate) struct MockStream {
    responses: Cursor<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
    gate: Option<Arc<Gate>>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.responses.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write failure"));
        }
        self.written.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Stream for MockStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 49152)))
    }

    fn shutdown_write(&self) -> io::Result<()> {
        Ok(())
    }
}
