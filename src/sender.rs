//! The capability shared by everything that can deliver frames to the collector.

use std::time::{Duration, SystemTime};

use crate::client::Error;
use crate::proto::MetricKind;

/// Something that can deliver metrics and notices to the collector.
///
/// There are two implementations: [`Client`](crate::Client), which owns the transport, and
/// [`Streamer`](crate::Streamer), which queues sends onto a worker and forwards everything else
/// to the client it wraps.
pub trait Sender {
    /// Establishes and authenticates a connection to the collector.
    ///
    /// This operation is not idempotent: callers must check [`is_connected`][Self::is_connected]
    /// first, or rely on the connect-on-demand behavior of [`send`][Self::send] and the `notice`
    /// family instead.
    ///
    /// # Errors
    ///
    /// Returns an error if a live connection already exists, if the endpoint cannot be resolved,
    /// if the collector rejects the handshake or the API key, or on any I/O failure. After a
    /// handshake failure the connection has been torn down.
    fn connect(&mut self) -> Result<(), Error>;

    /// Returns `true` if a live connection is held.
    ///
    /// This is a cheap local check, never a network round-trip.
    fn is_connected(&self) -> bool;

    /// Sends one metric sample, connecting first if necessary.
    ///
    /// `timestamp` is seconds since the Unix epoch. A successful write resets the consecutive
    /// failure count to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the connect-on-demand attempt fails, or if the write fails. Write
    /// failures increment the count reported by [`failures`][Self::failures]; connect failures
    /// do not. Failed sends are never retried internally.
    fn send(
        &mut self,
        kind: MetricKind,
        name: &str,
        value: &str,
        timestamp: u64,
    ) -> Result<(), Error>;

    /// Sends a notice at the current time with no duration.
    ///
    /// Notices are fire-and-forget: any failure is swallowed after a best-effort close.
    fn notice(&mut self, name: &str) {
        self.notice_with_duration(name, Duration::ZERO);
    }

    /// Sends a notice at the current time with the given duration.
    ///
    /// Notices are fire-and-forget: any failure is swallowed after a best-effort close.
    fn notice_with_duration(&mut self, name: &str, duration: Duration) {
        self.notice_at(name, SystemTime::now(), duration);
    }

    /// Sends a notice with the given start time and duration.
    ///
    /// Both are truncated to whole seconds. Notices are fire-and-forget: any failure, including
    /// a failed reconnect, is swallowed after a best-effort close so that notice call sites can
    /// be used liberally in control flow.
    fn notice_at(&mut self, name: &str, start: SystemTime, duration: Duration);

    /// Flushes the connection's output buffer; a no-op when disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying connection fails.
    fn flush(&mut self) -> Result<(), Error>;

    /// Shuts down the write side and closes the connection; a no-op when already disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails. The connection handle is released either way, and
    /// closing an already-closed sender never errors.
    fn close(&mut self) -> Result<(), Error>;

    /// Returns the number of consecutive failed writes since the last successful one.
    ///
    /// Purely observational; intended for health checks and circuit-breaking decisions made
    /// outside this crate.
    fn failures(&self) -> u32;
}
