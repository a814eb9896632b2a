//! A client for streaming metrics and notices to an [Instrumental][instrumental]-compatible
//! collector over TCP.
//!
//! The collector speaks a newline-delimited ASCII protocol: after a `hello`/`authenticate`
//! handshake, each metric or notice is a single fire-and-forget line. This crate owns the
//! connection lifecycle (lazy resolution, handshake, reconnect-on-demand, teardown), sanitizes
//! caller-supplied names and values into protocol-safe text, and offers an asynchronous
//! dispatch path so callers are never blocked by network I/O.
//!
//! # Usage
//!
//! [`Client`] is the transport-backed [`Sender`]: it connects on first use, so sending a metric
//! is enough to establish and authenticate the session.
//!
//! ```no_run
//! use instrumental_client::{Client, MetricKind, Sender as _};
//!
//! let mut client = Client::new("my-api-key");
//! client
//!     .send(MetricKind::Increment, "app.requests", "1", 1_700_000_000)
//!     .expect("failed to send metric");
//! ```
//!
//! For callers that must not block on the socket, [`Streamer`] wraps any [`Sender`] and queues
//! sends onto a dedicated worker:
//!
//! ```no_run
//! use instrumental_client::{Client, MetricKind, Sender as _, Streamer};
//!
//! let client = Client::new("my-api-key");
//! let mut streamer = Streamer::new(client).expect("failed to spawn streamer worker");
//!
//! // Returns as soon as the task is queued; the worker performs the write.
//! streamer.send(MetricKind::Increment, "app.requests", "1", 1_700_000_000).unwrap();
//! ```
//!
//! # Error handling
//!
//! [`Sender::send`] surfaces every failure to the caller and never retries; the consecutive
//! failed-write count is available via [`Sender::failures`] for external health checks. The
//! `notice` family is the deliberate exception: notices are fire-and-forget telemetry, so any
//! failure (including a failed reconnect) is swallowed after a best-effort close.
//!
//! [instrumental]: https://instrumentalapp.com
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod client;
pub use self::client::{Client, Error};

mod connector;
pub use self::connector::{Connect, Endpoint, Stream, TcpConnector};

mod proto;
pub use self::proto::MetricKind;

mod sender;
pub use self::sender::Sender;

mod streamer;
pub use self::streamer::Streamer;

#[cfg(test)]
mod test_util;
