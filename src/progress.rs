//! Progress reporting.
//!
//! Build and teardown emit one [`ProgressEvent`] per completed runtime
//! operation into a [`ProgressSink`]. The sink is the only coupling between
//! the orchestration core and whatever presents progress: a terminal, the
//! log, or nothing at all. Emitting never blocks on the consumer.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::info;

/// One completed operation and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub elapsed: Duration,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(elapsed: Duration, message: impl Into<String>) -> Self {
        Self {
            elapsed,
            message: message.into(),
        }
    }
}

/// Destination of progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Run `op`, then emit `message(result)` with the elapsed time if it succeeded.
pub fn timed<T, E>(
    sink: &dyn ProgressSink,
    op: impl FnOnce() -> Result<T, E>,
    message: impl FnOnce(&T) -> String,
) -> Result<T, E> {
    let start = Instant::now();
    let value = op()?;
    sink.emit(ProgressEvent::new(start.elapsed(), message(&value)));
    Ok(value)
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        info!("{} ({:?})", event.message, event.elapsed);
    }
}

/// Sending half of a progress channel.
///
/// Events sent after the receiver is gone are dropped.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<ProgressEvent>,
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

/// Unbounded one-directional channel from a worker to a presentation loop.
///
/// The receiver yields events until the sink is dropped.
pub fn channel() -> (ChannelSink, Receiver<ProgressEvent>) {
    let (sender, receiver) = mpsc::channel();
    (ChannelSink { sender }, receiver)
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
