//! An asynchronous dispatch wrapper around a [`Sender`].

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, Sender as TaskSender};
use parking_lot::Mutex;
use tracing::{error, trace};

use crate::client::Error;
use crate::proto::MetricKind;
use crate::sender::Sender;

/// One queued emission, carrying only plain data.
enum Task {
    Metric { kind: MetricKind, name: String, value: String, timestamp: u64 },
    Notice { name: String, start: SystemTime, duration: Duration },
}

/// A queuing decorator over a [`Sender`].
///
/// `send` and the `notice` family capture their arguments into a task and hand it to a dedicated
/// worker thread, returning as soon as the task is queued; all other operations delegate
/// synchronously to the wrapped sender. The single worker drains the queue one task at a time,
/// so frames reach the wire in submission order and the wrapped sender never sees concurrent
/// access, even though the queue itself is unbounded and accepts tasks from any number of
/// threads.
///
/// Cloning a `Streamer` produces another producer handle onto the same queue and sender. The
/// worker exits once every handle has been dropped and the remaining queue has been drained.
///
/// The synchronous escape hatches ([`send_sync`][Streamer::send_sync] and friends) execute
/// inline on the calling thread, serialized against the worker.
pub struct Streamer<S> {
    inner: Arc<Mutex<S>>,
    tasks: TaskSender<Task>,
}

impl<S: Sender + Send + 'static> Streamer<S> {
    /// Wraps `sender`, spawning the worker thread that executes queued tasks against it.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new(sender: S) -> Result<Streamer<S>, Error> {
        let inner = Arc::new(Mutex::new(sender));
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker_inner = Arc::clone(&inner);
        thread::Builder::new()
            .name("instrumental-streamer".to_string())
            .spawn(move || run_worker(&worker_inner, &rx))
            .map_err(|_| Error::Worker)?;

        Ok(Streamer { inner, tasks: tx })
    }

    /// Sends one metric sample inline on the calling thread, bypassing the queue.
    ///
    /// # Errors
    ///
    /// Propagates the underlying sender's failure directly, unlike the queued
    /// [`send`][Sender::send].
    pub fn send_sync(
        &self,
        kind: MetricKind,
        name: &str,
        value: &str,
        timestamp: u64,
    ) -> Result<(), Error> {
        self.inner.lock().send(kind, name, value, timestamp)
    }

    /// Sends a notice at the current time with no duration, inline on the calling thread.
    pub fn notice_sync(&self, name: &str) {
        self.inner.lock().notice(name);
    }

    /// Sends a notice at the current time with the given duration, inline on the calling thread.
    pub fn notice_with_duration_sync(&self, name: &str, duration: Duration) {
        self.inner.lock().notice_with_duration(name, duration);
    }

    /// Sends a notice with the given start time and duration, inline on the calling thread.
    pub fn notice_at_sync(&self, name: &str, start: SystemTime, duration: Duration) {
        self.inner.lock().notice_at(name, start, duration);
    }
}

impl<S: Sender + Send + 'static> Sender for Streamer<S> {
    fn connect(&mut self) -> Result<(), Error> {
        self.inner.lock().connect()
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().is_connected()
    }

    /// Queues one metric sample and returns immediately.
    ///
    /// Submission is best-effort fire: a disconnected queue means the worker is gone, and the
    /// sample is silently dropped.
    fn send(
        &mut self,
        kind: MetricKind,
        name: &str,
        value: &str,
        timestamp: u64,
    ) -> Result<(), Error> {
        let _ = self.tasks.send(Task::Metric {
            kind,
            name: name.to_string(),
            value: value.to_string(),
            timestamp,
        });
        Ok(())
    }

    fn notice_at(&mut self, name: &str, start: SystemTime, duration: Duration) {
        let _ = self.tasks.send(Task::Notice { name: name.to_string(), start, duration });
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.inner.lock().flush()
    }

    fn close(&mut self) -> Result<(), Error> {
        self.inner.lock().close()
    }

    fn failures(&self) -> u32 {
        self.inner.lock().failures()
    }
}

impl<S> Clone for Streamer<S> {
    fn clone(&self) -> Self {
        Streamer { inner: Arc::clone(&self.inner), tasks: self.tasks.clone() }
    }
}

fn run_worker<S: Sender>(client: &Mutex<S>, tasks: &Receiver<Task>) {
    for task in tasks {
        let mut client = client.lock();
        match task {
            Task::Metric { kind, name, value, timestamp } => {
                if let Err(e) = client.send(kind, &name, &value, timestamp) {
                    error!(error = %e, metric = %name, "failed to send queued metric");
                }
            }
            Task::Notice { name, start, duration } => client.notice_at(&name, start, duration),
        }
    }
    trace!("task queue disconnected, worker exiting");
}
